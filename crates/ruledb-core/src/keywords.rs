//! Lexicon-driven keyword extraction used to build the lexical query variant.

use std::collections::BTreeMap;
use std::path::Path;

use figment::{
    providers::{Format, Toml},
    Figment,
};
use tracing::debug;

use crate::config::KeywordSettings;
use crate::error::{Error, Result};

const BUILTIN_GROUPS: &[(&str, &[&str])] = &[
    ("separation", &["辞职", "离职", "解聘", "辞退", "提前", "申请", "书面"]),
    ("onboarding", &["入职", "录用", "报到", "试用", "转正"]),
    ("attendance", &["考勤", "打卡", "迟到", "早退", "旷工", "请假"]),
    ("compensation", &["工资", "薪酬", "薪资", "福利", "社保", "公积金"]),
    ("time_units", &["天", "月", "年", "日", "周"]),
    ("organization", &["员工", "部门", "主管", "公司", "规定", "制度"]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexiconGroup {
    pub theme: String,
    pub words: Vec<String>,
}

/// Themed word list matched by substring containment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexicon {
    groups: Vec<LexiconGroup>,
}

impl Default for Lexicon {
    fn default() -> Self {
        let groups = BUILTIN_GROUPS
            .iter()
            .map(|(theme, words)| LexiconGroup {
                theme: theme.to_string(),
                words: words.iter().map(|w| w.to_string()).collect(),
            })
            .collect();
        Self { groups }
    }
}

impl Lexicon {
    pub fn new(groups: Vec<LexiconGroup>) -> Self {
        Self { groups }
    }

    pub fn from_map(map: BTreeMap<String, Vec<String>>) -> Self {
        let groups = map
            .into_iter()
            .map(|(theme, words)| LexiconGroup { theme, words })
            .collect();
        Self { groups }
    }

    /// Read a TOML table of `theme = ["word", ...]` arrays.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let map: BTreeMap<String, Vec<String>> = Figment::from(Toml::file(path))
            .extract()
            .map_err(|e| Error::InvalidConfig(format!("lexicon {}: {}", path.display(), e)))?;
        Ok(Self::from_map(map))
    }

    /// Inline lexicon wins over `lexicon_file`; neither keeps the built-in list.
    pub fn from_settings(settings: &KeywordSettings) -> Result<Self> {
        if let Some(map) = &settings.lexicon {
            return Ok(Self::from_map(map.clone()));
        }
        if let Some(file) = &settings.lexicon_file {
            return Self::from_toml_file(&crate::config::expand_path(file));
        }
        Ok(Self::default())
    }

    pub fn groups(&self) -> &[LexiconGroup] {
        &self.groups
    }

    fn words(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().flat_map(|g| g.words.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeywordExtractor {
    lexicon: Lexicon,
}

impl KeywordExtractor {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    /// Digit runs first, then lexicon hits, each kept once in first-seen order.
    pub fn extract(&self, query: &str) -> Vec<String> {
        let mut keywords: Vec<String> = Vec::new();
        let mut push = |word: &str| {
            if !word.is_empty() && !keywords.iter().any(|k| k == word) {
                keywords.push(word.to_string());
            }
        };

        for run in query.split(|c: char| !c.is_ascii_digit()) {
            push(run);
        }
        for word in self.lexicon.words() {
            if query.contains(word) {
                push(word);
            }
        }

        debug!(?keywords, "extracted keywords");
        keywords
    }
}
