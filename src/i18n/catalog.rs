//! Built-in message tables, installed into a registry at startup.
//!
//! Templates use positional `%` placeholders. Field-level codes in `COMMON`
//! take the field name as their first argument.

use crate::i18n::MessageRegistry;

/// Languages the built-in catalog covers.
pub const LANGUAGES: &[&str] = &["en", "fa"];

/// Generic request and validation messages
pub const COMMON: &str = "COMMON";

// ==================== COMMON ====================

const COMMON_EN: &[(&str, &str)] = &[
    ("INVALID_JSON", "Invalid JSON body: %s"),
    ("EXPECTED_OBJECT", "Expected a JSON object."),
    ("UNKNOWN_FIELD", "Unknown field: %s"),
    ("REQUIRED", "%s: this field is required."),
    ("TOO_LONG", "%s: ensure this field has no more than %d characters."),
    ("INVALID_EMAIL", "%s: enter a valid email address."),
    ("INVALID_URL", "%s: enter a valid URL."),
    ("EXPECTED_BOOLEAN", "%s: must be a valid boolean."),
    ("EXPECTED_INTEGER", "%s: a valid integer is required."),
    ("EXPECTED_TEXT", "%s: not a valid string."),
    ("EXPECTED_ID_LIST", "%s: expected a list of identifiers."),
    ("UNKNOWN_REFERENCE", "%s: invalid pk \"%d\" - object does not exist."),
    ("DUPLICATE", "%s: a record with this value already exists."),
    ("NOT_FOUND", "Not found."),
    ("INVALID_PAGE", "Invalid page."),
    ("INVALID_ORDERING", "Invalid ordering field: %s"),
    ("INVALID_FILTER", "%s: invalid filter value."),
    ("UNAUTHORIZED", "Authentication credentials were not provided or are invalid."),
];

const COMMON_FA: &[(&str, &str)] = &[
    ("INVALID_JSON", "بدنه JSON نامعتبر است: %s"),
    ("EXPECTED_OBJECT", "یک شیء JSON مورد انتظار است."),
    ("UNKNOWN_FIELD", "فیلد ناشناخته: %s"),
    ("REQUIRED", "%s: این فیلد الزامی است."),
    ("TOO_LONG", "%s: طول این فیلد نباید بیشتر از %d کاراکتر باشد."),
    ("INVALID_EMAIL", "%s: یک آدرس ایمیل معتبر وارد کنید."),
    ("INVALID_URL", "%s: یک نشانی اینترنتی معتبر وارد کنید."),
    ("EXPECTED_BOOLEAN", "%s: باید یک مقدار درست یا نادرست باشد."),
    ("EXPECTED_INTEGER", "%s: یک عدد صحیح معتبر لازم است."),
    ("EXPECTED_TEXT", "%s: یک رشته معتبر نیست."),
    ("EXPECTED_ID_LIST", "%s: فهرستی از شناسه‌ها مورد انتظار است."),
    ("UNKNOWN_REFERENCE", "%s: شناسه «%d» نامعتبر است؛ چنین رکوردی وجود ندارد."),
    ("DUPLICATE", "%s: رکوردی با این مقدار از قبل وجود دارد."),
    ("NOT_FOUND", "یافت نشد."),
    ("INVALID_PAGE", "صفحه نامعتبر است."),
    ("INVALID_ORDERING", "فیلد مرتب‌سازی نامعتبر: %s"),
    ("INVALID_FILTER", "%s: مقدار فیلتر نامعتبر است."),
    ("UNAUTHORIZED", "اطلاعات احراز هویت ارائه نشده یا نامعتبر است."),
];

// ==================== Facilities ====================

/// (event, English, Farsi) not-found messages; the argument is the record id.
const NOT_FOUND: &[(&str, &str, &str)] = &[
    (
        "FACILITY",
        "Medical facility %d was not found.",
        "مرکز درمانی %d یافت نشد.",
    ),
    (
        "FACILITY_TYPE",
        "Facility type %d was not found.",
        "نوع مرکز درمانی %d یافت نشد.",
    ),
    (
        "FACILITY_SUBTYPE",
        "Facility subtype %d was not found.",
        "زیرنوع (تخصص) مرکز درمانی %d یافت نشد.",
    ),
    (
        "OWNERSHIP_TYPE",
        "Ownership type %d was not found.",
        "نوع مالکیت %d یافت نشد.",
    ),
];

/// Register every built-in table.
pub fn install(registry: &MessageRegistry) {
    registry.register(COMMON, "en", COMMON_EN.iter().copied());
    registry.register(COMMON, "fa", COMMON_FA.iter().copied());

    for (event, english, farsi) in NOT_FOUND {
        registry.register(event, "en", [("NOT_FOUND", *english)]);
        registry.register(event, "fa", [("NOT_FOUND", *farsi)]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn installed() -> MessageRegistry {
        let registry = MessageRegistry::new("fa");
        install(&registry);
        registry
    }

    #[test]
    fn test_common_tables_have_same_codes() {
        let english: HashSet<_> = COMMON_EN.iter().map(|(code, _)| code).collect();
        let farsi: HashSet<_> = COMMON_FA.iter().map(|(code, _)| code).collect();
        assert_eq!(english, farsi);
    }

    #[test]
    fn test_every_catalog_language_is_installed() {
        let registry = installed();
        for language in LANGUAGES {
            assert!(registry.has_language(language), "Missing language {}", language);
        }
    }

    #[test]
    fn test_placeholders_match_across_languages() {
        fn placeholders(template: &str) -> Vec<&str> {
            template
                .match_indices('%')
                .map(|(i, _)| &template[i..i + 2])
                .collect()
        }

        for ((code, english), (_, farsi)) in COMMON_EN.iter().zip(COMMON_FA) {
            assert_eq!(placeholders(english), placeholders(farsi), "Placeholder mismatch in {}", code);
        }
    }

    #[test]
    fn test_facility_not_found_resolves_in_both_languages() {
        let registry = installed();

        assert_eq!(
            registry.resolve_in("en", "FACILITY", "NOT_FOUND", &[12i64.into()]).unwrap(),
            "Medical facility 12 was not found."
        );
        assert_eq!(
            registry.resolve("FACILITY", "NOT_FOUND", &[12i64.into()]).unwrap(),
            "مرکز درمانی 12 یافت نشد."
        );
    }

    #[test]
    fn test_field_messages_format() {
        let registry = installed();
        let text = registry
            .resolve_in(
                "en",
                COMMON,
                "UNKNOWN_REFERENCE",
                &["type".into(), 9i64.into()],
            )
            .unwrap();
        assert_eq!(text, "type: invalid pk \"9\" - object does not exist.");
    }
}
