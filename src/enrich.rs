// src/enrich.rs
//! Fill the EN/ZH title and summary slots of ranked items.

use tracing::info;

use crate::model::NewsItem;
use crate::text::truncate;
use crate::translate::Translate;

pub const TITLE_LIMIT: usize = 200;
pub const SUMMARY_LIMIT: usize = 360;

/// `(source, target)` language codes for an item's declared language.
pub fn lang_pair(language: &str) -> (&'static str, &'static str) {
    let is_zh = language
        .get(..2)
        .is_some_and(|p| p.eq_ignore_ascii_case("zh"));
    if is_zh {
        ("zh-CN", "en")
    } else {
        ("en", "zh-CN")
    }
}

/// Copy native fields verbatim and translate the other language, one item at
/// a time in order.
pub async fn add_bilingual_fields(items: &mut [NewsItem], translator: &dyn Translate) {
    for item in items.iter_mut() {
        let (source_lang, target_lang) = lang_pair(&item.language);
        let title = truncate(
            &translator.translate(&item.title, source_lang, target_lang).await,
            TITLE_LIMIT,
        );
        let summary = truncate(
            &translator
                .translate(&item.summary, source_lang, target_lang)
                .await,
            SUMMARY_LIMIT,
        );

        if source_lang == "en" {
            item.title_en = Some(item.title.clone());
            item.summary_en = Some(item.summary.clone());
            item.title_zh = Some(title);
            item.summary_zh = Some(summary);
        } else {
            item.title_zh = Some(item.title.clone());
            item.summary_zh = Some(item.summary.clone());
            item.title_en = Some(title);
            item.summary_en = Some(summary);
        }
    }
    info!(target: "enrich", items = items.len(), provider = translator.provider_name(), "bilingual fields added");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zh_prefix_is_case_insensitive() {
        assert_eq!(lang_pair("zh-CN"), ("zh-CN", "en"));
        assert_eq!(lang_pair("ZH"), ("zh-CN", "en"));
        assert_eq!(lang_pair("en"), ("en", "zh-CN"));
        assert_eq!(lang_pair(""), ("en", "zh-CN"));
        assert_eq!(lang_pair("z"), ("en", "zh-CN"));
    }
}
