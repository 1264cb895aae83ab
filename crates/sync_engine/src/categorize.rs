use serde::{Deserialize, Serialize};
use sync_core::NoteRecord;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl Category {
    pub fn new(name: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            keywords: keywords.iter().map(|keyword| keyword.to_string()).collect(),
            is_default: false,
        }
    }

    pub fn fallback(name: impl Into<String>) -> Self {
        Self {
            is_default: true,
            ..Self::new(name, &[])
        }
    }
}

pub fn default_categories() -> Vec<Category> {
    vec![
        Category::new("美妆护肤", &["护肤", "化妆", "口红", "面膜", "精华", "防晒"]),
        Category::new("穿搭时尚", &["穿搭", "时尚", "搭配", "服装", "鞋子", "包包"]),
        Category::new("美食料理", &["美食", "料理", "菜谱", "烘焙", "甜品", "餐厅"]),
        Category::new("旅行出游", &["旅行", "景点", "攻略", "酒店", "机票", "自由行"]),
        Category::new("生活日常", &["生活", "日常", "家居", "收纳", "清洁", "健康"]),
        Category::new("学习工作", &["学习", "工作", "效率", "技能", "读书", "职场"]),
        Category::fallback("未分类"),
    ]
}

/// First non-default category with a keyword in the record's text, else the default one.
pub fn categorize<'a>(record: &NoteRecord, categories: &'a [Category]) -> Option<&'a Category> {
    let mut text = record.title.clone();
    for part in [&record.content, &record.author_name].into_iter().flatten() {
        text.push(' ');
        text.push_str(part);
    }
    for tag in &record.tags {
        text.push(' ');
        text.push_str(tag);
    }
    let text = text.to_lowercase();

    categories
        .iter()
        .filter(|category| !category.is_default)
        .find(|category| {
            category
                .keywords
                .iter()
                .any(|keyword| !keyword.is_empty() && text.contains(&keyword.to_lowercase()))
        })
        .or_else(|| categories.iter().find(|category| category.is_default))
}
