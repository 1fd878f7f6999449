//! 策略注册表
//!
//! 名称到 `PolicyTable` 的不可变映射，构建一次后只读共享。内置 `default` 与 `strict` 两个变体，
//! 另外可以从目录中加载 `<name>.toml` 策略文件；文件可以用 `extends` 继承另一个变体再增删条目。

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{SanitizeError, ScrubResult};

use super::{default_policy, strict_policy, PolicyTable};

/// 默认变体名称
pub const DEFAULT_POLICY: &str = "default";

/// 策略文件格式
///
/// ```toml
/// extends = "default"
/// allow_tags = ["video"]
/// remove_tags = ["img"]
/// allow_schemes = ["ftp"]
///
/// [tag_attributes]
/// video = ["src", "controls"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyFile {
    pub extends: Option<String>,
    pub allow_tags: Vec<String>,
    pub remove_tags: Vec<String>,
    pub strip_subtree: Vec<String>,
    pub global_attributes: Vec<String>,
    pub remove_global_attributes: Vec<String>,
    pub tag_attributes: BTreeMap<String, Vec<String>>,
    pub uri_attributes: Vec<String>,
    pub image_attributes: Vec<String>,
    pub allow_schemes: Vec<String>,
    pub remove_schemes: Vec<String>,
    pub allow_data_images: Option<bool>,
    pub denied_attribute_prefixes: Vec<String>,
    pub deny_css_properties: Vec<String>,
    pub deny_css_functions: Vec<String>,
    pub allow_at_rules: Vec<String>,
    pub remove_at_rules: Vec<String>,
}

fn lower(items: &[String]) -> impl Iterator<Item = String> + '_ {
    items.iter().map(|s| s.trim().to_ascii_lowercase())
}

fn remove_all(set: &mut BTreeSet<String>, items: &[String]) {
    for item in lower(items) {
        set.remove(&item);
    }
}

impl PolicyFile {
    /// 在基础策略上应用本文件的增删
    pub fn apply(&self, name: &str, base: &PolicyTable) -> PolicyTable {
        let mut table = base.clone();
        table.name = name.to_string();

        table.allowed_tags.extend(lower(&self.allow_tags));
        remove_all(&mut table.allowed_tags, &self.remove_tags);
        for tag in lower(&self.strip_subtree) {
            table.allowed_tags.remove(&tag);
            table.strip_subtree.insert(tag);
        }
        // 显式允许的标签优先于继承来的子树剥离
        remove_all(&mut table.strip_subtree, &self.allow_tags);

        table.global_attributes.extend(lower(&self.global_attributes));
        remove_all(&mut table.global_attributes, &self.remove_global_attributes);
        for (tag, attrs) in &self.tag_attributes {
            table
                .tag_attributes
                .entry(tag.to_ascii_lowercase())
                .or_default()
                .extend(lower(attrs));
        }
        table.uri_attributes.extend(lower(&self.uri_attributes));
        table.image_attributes.extend(lower(&self.image_attributes));
        table.uri_attributes.extend(lower(&self.image_attributes));

        table.allowed_schemes.extend(lower(&self.allow_schemes));
        remove_all(&mut table.allowed_schemes, &self.remove_schemes);
        if let Some(allow) = self.allow_data_images {
            table.allow_data_images = allow;
        }

        table
            .denied_attribute_prefixes
            .extend(lower(&self.denied_attribute_prefixes));
        table.denied_css_properties.extend(lower(&self.deny_css_properties));
        table.denied_css_functions.extend(lower(&self.deny_css_functions));
        table.allowed_at_rules.extend(lower(&self.allow_at_rules));
        remove_all(&mut table.allowed_at_rules, &self.remove_at_rules);
        table.allowed_at_rules.remove("import");

        table
    }
}

/// 策略名称必须是简单的标识符
pub fn is_valid_policy_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// 不可变的策略注册表
#[derive(Debug, Clone)]
pub struct PolicyRegistry {
    policies: HashMap<String, Arc<PolicyTable>>,
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PolicyRegistry {
    /// 只包含内置变体的注册表
    pub fn builtin() -> Self {
        let mut policies = HashMap::new();
        policies.insert(DEFAULT_POLICY.to_string(), Arc::new(default_policy()));
        policies.insert("strict".to_string(), Arc::new(strict_policy()));
        Self { policies }
    }

    /// 内置变体加上目录中的策略文件
    pub fn from_dir(dir: &str) -> ScrubResult<Self> {
        let expanded = shellexpand::tilde(dir);
        let path = Path::new(expanded.as_ref());
        info!("加载策略目录: {}", path.display());

        let entries = std::fs::read_dir(path).map_err(|e| {
            SanitizeError::Configuration(format!("读取策略目录失败 {}: {}", path.display(), e))
        })?;

        let mut files = BTreeMap::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| SanitizeError::Configuration(format!("读取策略目录失败: {}", e)))?;
            let file_path = entry.path();
            if file_path.extension().and_then(|e| e.to_str()) != Some("toml") {
                debug!("跳过非策略文件: {}", file_path.display());
                continue;
            }
            let Some(name) = file_path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !is_valid_policy_name(name) {
                warn!("策略文件名无效，已跳过: {}", file_path.display());
                continue;
            }

            let content = std::fs::read_to_string(&file_path).map_err(|e| {
                SanitizeError::Configuration(format!(
                    "读取策略文件失败 {}: {}",
                    file_path.display(),
                    e
                ))
            })?;
            files.insert(name.to_string(), content);
        }

        Self::from_sources(files)
    }

    /// 由 `名称 -> TOML 文本` 构建注册表
    pub fn from_sources(sources: BTreeMap<String, String>) -> ScrubResult<Self> {
        let mut parsed = BTreeMap::new();
        for (name, content) in sources {
            let file: PolicyFile = toml::from_str(&content).map_err(|e| {
                SanitizeError::Configuration(format!("解析策略文件 {} 失败: {}", name, e))
            })?;
            parsed.insert(name, file);
        }

        let mut resolved = HashMap::new();
        for name in parsed.keys() {
            let mut chain = Vec::new();
            resolve(name, &parsed, &mut resolved, &mut chain)?;
        }

        let mut registry = Self::builtin();
        registry.policies.extend(resolved);
        info!("已加载 {} 个策略变体", registry.policies.len());
        Ok(registry)
    }

    /// 按名称取得策略，`None` 表示默认变体
    pub fn get(&self, name: Option<&str>) -> ScrubResult<Arc<PolicyTable>> {
        let name = name.unwrap_or(DEFAULT_POLICY);
        self.policies
            .get(name)
            .cloned()
            .ok_or_else(|| SanitizeError::UnknownPolicy(name.to_string()))
    }

    /// 已注册的变体名称（排序后）
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.policies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// 解析一个策略文件及其继承链
fn resolve(
    name: &str,
    parsed: &BTreeMap<String, PolicyFile>,
    resolved: &mut HashMap<String, Arc<PolicyTable>>,
    chain: &mut Vec<String>,
) -> ScrubResult<Arc<PolicyTable>> {
    if let Some(done) = resolved.get(name) {
        return Ok(Arc::clone(done));
    }
    let Some(file) = parsed.get(name) else {
        return builtin_table(name)
            .map(Arc::new)
            .ok_or_else(|| SanitizeError::UnknownPolicy(name.to_string()));
    };
    if chain.iter().any(|n| n == name) {
        return Err(SanitizeError::Configuration(format!(
            "策略继承存在循环: {} -> {}",
            chain.join(" -> "),
            name
        )));
    }

    chain.push(name.to_string());
    let base = match file.extends.as_deref() {
        // 与内置变体同名的文件可以继承该内置变体
        Some(parent) if parent == name => builtin_table(parent).map(Arc::new).ok_or_else(|| {
            SanitizeError::Configuration(format!("策略 {} 不能继承自身", name))
        })?,
        Some(parent) => resolve(parent, parsed, resolved, chain)?,
        None => Arc::new(PolicyTable::default()),
    };
    chain.pop();

    debug!("策略 {} 继承自 {}", name, base.name);
    let table = Arc::new(file.apply(name, &base));
    resolved.insert(name.to_string(), Arc::clone(&table));
    Ok(table)
}

fn builtin_table(name: &str) -> Option<PolicyTable> {
    match name {
        DEFAULT_POLICY => Some(default_policy()),
        "strict" => Some(strict_policy()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(items: &[(&str, &str)]) -> BTreeMap<String, String> {
        items
            .iter()
            .map(|(name, content)| (name.to_string(), content.to_string()))
            .collect()
    }

    #[test]
    fn builtin_variants() {
        let registry = PolicyRegistry::builtin();
        assert_eq!(registry.get(None).unwrap().name, "default");
        assert_eq!(registry.get(Some("strict")).unwrap().name, "strict");
        assert_eq!(registry.names(), vec!["default", "strict"]);
    }

    #[test]
    fn unknown_variant() {
        let registry = PolicyRegistry::builtin();
        let err = registry.get(Some("nope")).unwrap_err();
        assert_eq!(err, SanitizeError::UnknownPolicy("nope".to_string()));
        assert_eq!(err.code(), "HTM-0002");
    }

    #[test]
    fn extends_and_overrides() {
        let registry = PolicyRegistry::from_sources(sources(&[
            (
                "newsletter",
                r#"
                extends = "default"
                allow_tags = ["video"]
                remove_tags = ["img"]
                allow_schemes = ["ftp"]
                remove_at_rules = ["font-face"]

                [tag_attributes]
                video = ["src", "controls"]
                "#,
            ),
            ("narrow", "extends = \"newsletter\"\nremove_schemes = [\"ftp\"]"),
        ]))
        .unwrap();

        let table = registry.get(Some("newsletter")).unwrap();
        assert!(table.allows_tag("video"));
        assert!(!table.strips_subtree("video"));
        assert!(!table.allows_tag("img"));
        assert!(table.allows_attribute("video", "controls"));
        assert!(table.allows_scheme("ftp"));
        assert!(!table.allows_at_rule("font-face"));

        let narrow = registry.get(Some("narrow")).unwrap();
        assert!(narrow.allows_tag("video"));
        assert!(!narrow.allows_scheme("ftp"));
    }

    #[test]
    fn import_can_never_be_allowed() {
        let registry = PolicyRegistry::from_sources(sources(&[(
            "loose",
            "extends = \"default\"\nallow_at_rules = [\"import\"]",
        )]))
        .unwrap();
        assert!(!registry.get(Some("loose")).unwrap().allows_at_rule("import"));
    }

    #[test]
    fn invalid_files() {
        let err = PolicyRegistry::from_sources(sources(&[("bad", "allow_tags = 3")])).unwrap_err();
        assert_eq!(err.code(), "HTM-0004");

        let err = PolicyRegistry::from_sources(sources(&[("typo", "alow_tags = []")])).unwrap_err();
        assert_eq!(err.code(), "HTM-0004");

        let err = PolicyRegistry::from_sources(sources(&[
            ("a", "extends = \"b\""),
            ("b", "extends = \"a\""),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("循环"));

        let err = PolicyRegistry::from_sources(sources(&[("orphan", "extends = \"missing\"")]))
            .unwrap_err();
        assert_eq!(err, SanitizeError::UnknownPolicy("missing".to_string()));
    }

    #[test]
    fn file_can_refine_builtin_of_same_name() {
        let registry = PolicyRegistry::from_sources(sources(&[(
            "strict",
            "extends = \"strict\"\nallow_tags = [\"h1\"]",
        )]))
        .unwrap();
        let table = registry.get(Some("strict")).unwrap();
        assert!(table.allows_tag("h1"));
        assert!(!table.allows_tag("img"));
    }

    #[test]
    fn missing_directory() {
        let err = PolicyRegistry::from_dir("/nonexistent/htmlscrub/policies").unwrap_err();
        assert_eq!(err.code(), "HTM-0004");
    }
}
