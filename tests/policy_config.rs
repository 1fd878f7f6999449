//  ██████╗  █████╗ ███████╗███████╗██╗███╗   ██╗ ██████╗
//  ██╔══██╗██╔══██╗██╔════╝██╔════╝██║████╗  ██║██╔════╝
//  ██████╔╝███████║███████╗███████╗██║██╔██╗ ██║██║  ███╗
//  ██╔═══╝ ██╔══██║╚════██║╚════██║██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║███████║███████║██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

use std::fs;

use tempfile::TempDir;

/// 写入策略文件的临时目录，`TempDir` 离开作用域时删除
fn policy_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
        fs::write(dir.path().join(name), content).unwrap();
    }
    dir
}

fn path_of(dir: &TempDir) -> &str {
    dir.path().to_str().unwrap()
}

#[cfg(test)]
mod passing {
    use htmlscrub::core::{SanitizeOptions, Sanitizer};
    use htmlscrub::PolicyRegistry;

    use super::{path_of, policy_dir};

    #[test]
    fn loads_policy_files_from_directory() {
        let dir = policy_dir(&[
            (
                "newsletter.toml",
                "extends = \"default\"\nremove_tags = [\"img\"]\nallow_tags = [\"video\"]\n\n[tag_attributes]\nvideo = [\"controls\"]\n",
            ),
            ("notes.txt", "ignored"),
        ]);

        let registry = PolicyRegistry::from_dir(path_of(&dir)).unwrap();
        assert_eq!(registry.names(), vec!["default", "newsletter", "strict"]);

        let sanitizer = Sanitizer::new(registry);
        let options = SanitizeOptions {
            policy: Some("newsletter".to_string()),
            ..SanitizeOptions::default()
        };
        let result = sanitizer
            .sanitize("<video controls onplay=x()>clip</video><img src=a.png>", &options)
            .unwrap();
        assert_eq!(result.content, "<video controls=\"\">clip</video>");
    }

    #[test]
    fn strict_variant_drops_styles_and_images() {
        let sanitizer = Sanitizer::default();
        let options = SanitizeOptions {
            policy: Some("strict".to_string()),
            ..SanitizeOptions::default()
        };
        let result = sanitizer
            .sanitize(
                "<style>p{color:red}</style><p style=\"color:red\">a<img src=x.png>b</p>",
                &options,
            )
            .unwrap();
        assert_eq!(result.content, "<p>ab</p>");
        assert!(result.modified);
    }
}

//  ███████╗ █████╗ ██╗██╗     ██╗███╗   ██╗ ██████╗
//  ██╔════╝██╔══██╗██║██║     ██║████╗  ██║██╔════╝
//  █████╗  ███████║██║██║     ██║██╔██╗ ██║██║  ███╗
//  ██╔══╝  ██╔══██║██║██║     ██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║██║███████╗██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚═╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod failing {
    use htmlscrub::error::ErrorCategory;
    use htmlscrub::PolicyRegistry;

    use super::{path_of, policy_dir};

    #[test]
    fn missing_directory() {
        let err = PolicyRegistry::from_dir("/nonexistent/htmlscrub/policies").unwrap_err();
        assert_eq!(err.code(), "HTM-0004");
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn malformed_policy_file() {
        let dir = policy_dir(&[("broken.toml", "allow_tags = \"not a list\"")]);
        let err = PolicyRegistry::from_dir(path_of(&dir)).unwrap_err();
        assert_eq!(err.code(), "HTM-0004");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = policy_dir(&[("typo.toml", "alow_tags = [\"video\"]")]);
        assert!(PolicyRegistry::from_dir(path_of(&dir)).is_err());
    }

    #[test]
    fn inheritance_cycles_are_rejected() {
        let dir = policy_dir(&[("a.toml", "extends = \"b\""), ("b.toml", "extends = \"a\"")]);
        let err = PolicyRegistry::from_dir(path_of(&dir)).unwrap_err();
        assert_eq!(err.code(), "HTM-0004");
    }

    #[test]
    fn unknown_parent() {
        let dir = policy_dir(&[("child.toml", "extends = \"missing\"")]);
        let err = PolicyRegistry::from_dir(path_of(&dir)).unwrap_err();
        assert_eq!(err.code(), "HTM-0002");
    }
}
