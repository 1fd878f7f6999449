// 集成测试公共模块
//
// 每个对抗样例都要在两个解析后端上分别运行

use htmlscrub::core::{sanitize_with_options, SanitizeOptions, SanitizeResult};
use htmlscrub::error::ScrubResult;
use htmlscrub::parsers::html::backend::ParserBackend;

/// 在指定后端上使用内置策略净化
pub fn scrub_with(
    input: &str,
    backend: ParserBackend,
    options: &SanitizeOptions,
) -> ScrubResult<SanitizeResult> {
    let options = SanitizeOptions {
        backend,
        ..options.clone()
    };
    sanitize_with_options(input, &options)
}

/// 在所有后端上净化，返回 `(后端, 结果)`
pub fn scrub_all(input: &str, options: &SanitizeOptions) -> Vec<(ParserBackend, SanitizeResult)> {
    ParserBackend::ALL
        .iter()
        .map(|&backend| {
            let result = scrub_with(input, backend, options)
                .unwrap_or_else(|e| panic!("{} 后端净化失败: {:?} ({:?})", backend, input, e));
            (backend, result)
        })
        .collect()
}

/// 断言所有后端的输出都不包含任何危险子串（大小写不敏感）
pub fn assert_neutralized(input: &str, forbidden: &[&str]) {
    assert_neutralized_with(input, &SanitizeOptions::default(), forbidden);
}

pub fn assert_neutralized_with(input: &str, options: &SanitizeOptions, forbidden: &[&str]) {
    for (backend, result) in scrub_all(input, options) {
        let lowered = result.content.to_ascii_lowercase();
        for needle in forbidden {
            assert!(
                !lowered.contains(&needle.to_ascii_lowercase()),
                "[{}] 输入 {:?} 的输出仍包含 {:?}: {:?}",
                backend,
                input,
                needle,
                result.content
            );
        }
    }
}

/// 断言所有后端给出相同的输出，并返回该输出
pub fn assert_backends_agree(input: &str) -> String {
    let results = scrub_all(input, &SanitizeOptions::default());
    let (first_backend, first) = &results[0];
    for (backend, result) in &results[1..] {
        assert_eq!(
            first.content, result.content,
            "{} 与 {} 的输出不一致，输入 {:?}",
            first_backend, backend, input
        );
    }
    first.content.clone()
}
