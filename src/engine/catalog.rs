// src/engine/catalog.rs — Zone and reason catalogs, reason pagination

pub const REASONS_PER_PAGE: usize = 7;

/// The seven technology zones reports can be filed against.
pub fn default_zones() -> Vec<String> {
    [
        "Правобережная",
        "Левобережная",
        "Норильская",
        "Железногорская",
        "Зеленогорская",
        "Минусинская",
        "Таймырская",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Missed-pickup reasons. Each entry starts with its short code ("N.").
pub fn default_reasons() -> Vec<String> {
    [
        "1. Нет баков",
        "2. Боковая загрузка(задняя загрузка)",
        "3. Заставлено машинами",
        "4. Закрыт шлагбаум, ворота",
        "5. Не по графику",
        "6. Не успел",
        "7. Пустые баки",
        "8. Дорожные условия(нет проезда)",
        "9. Бак сломан",
        "10. Нет потребителя на адресе",
        "11. Бак (к/ст) на замке",
        "12. Несуществующий адрес",
        "13. Потребитель \"не отдает мусор\"",
        "14. Не выкатили баки",
        "15. Вывез другой подрядчик",
        "16. Не подъемный бак",
        "17. Мусор тлеет (горит)",
        "18. Гололед",
        "19. Строит.мусор, шины, ветки и листья",
        "20. Не полный вывоз (замерз бак)",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// One rendered page of the reason list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonPage<'a> {
    pub page: usize,
    pub items: &'a [String],
    pub has_prev: bool,
    pub has_next: bool,
}

/// Fixed zone and reason lists supplied at engine construction.
#[derive(Debug, Clone)]
pub struct Catalog {
    zones: Vec<String>,
    reasons: Vec<String>,
}

impl Catalog {
    pub fn new(zones: Vec<String>, reasons: Vec<String>) -> Self {
        Self { zones, reasons }
    }

    pub fn zones(&self) -> &[String] {
        &self.zones
    }

    pub fn is_known_zone(&self, zone: &str) -> bool {
        self.zones.iter().any(|z| z == zone)
    }

    pub fn page_count(&self) -> usize {
        self.reasons.len().div_ceil(REASONS_PER_PAGE)
    }

    /// Slice of the reason list shown on `page`. Out-of-range pages clamp
    /// to the last one so a stale "next" press never renders an empty page.
    pub fn reason_page(&self, page: usize) -> ReasonPage<'_> {
        let page = page.min(self.page_count().saturating_sub(1));
        let start = page * REASONS_PER_PAGE;
        let end = (start + REASONS_PER_PAGE).min(self.reasons.len());
        ReasonPage {
            page,
            items: &self.reasons[start..end],
            has_prev: start > 0,
            has_next: end < self.reasons.len(),
        }
    }

    /// Short code of a reason: everything up to and including the first dot.
    pub fn reason_code(reason: &str) -> &str {
        match reason.find('.') {
            Some(i) => &reason[..=i],
            None => reason,
        }
    }

    /// Resolve a short code back to the full reason text. Accepts the code
    /// with or without the trailing dot ("2" and "2." both resolve).
    pub fn resolve_reason(&self, code: &str) -> Option<&str> {
        let code = code.trim();
        if code.is_empty() {
            return None;
        }
        let prefix = if code.ends_with('.') {
            code.to_string()
        } else {
            format!("{code}.")
        };
        self.reasons
            .iter()
            .find(|r| r.starts_with(&prefix))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::new(default_zones(), default_reasons())
    }

    #[test]
    fn test_page_count_is_ceil() {
        let c = catalog();
        // 20 reasons at 7 per page
        assert_eq!(c.page_count(), 3);

        let c = Catalog::new(vec![], vec!["1. a".into(); 7]);
        assert_eq!(c.page_count(), 1);
        let c = Catalog::new(vec![], vec!["1. a".into(); 8]);
        assert_eq!(c.page_count(), 2);
    }

    #[test]
    fn test_pages_concatenate_to_full_list() {
        let c = catalog();
        let mut all = Vec::new();
        for page in 0..c.page_count() {
            all.extend_from_slice(c.reason_page(page).items);
        }
        assert_eq!(all, default_reasons());
    }

    #[test]
    fn test_navigation_flags() {
        let c = catalog();
        let first = c.reason_page(0);
        assert!(!first.has_prev);
        assert!(first.has_next);

        let middle = c.reason_page(1);
        assert!(middle.has_prev);
        assert!(middle.has_next);

        let last = c.reason_page(2);
        assert!(last.has_prev);
        assert!(!last.has_next);
        assert_eq!(last.items.len(), 6);
    }

    #[test]
    fn test_out_of_range_page_clamps() {
        let c = catalog();
        assert_eq!(c.reason_page(99), c.reason_page(2));
    }

    #[test]
    fn test_resolve_reason_by_code() {
        let c = catalog();
        assert_eq!(
            c.resolve_reason("2"),
            Some("2. Боковая загрузка(задняя загрузка)")
        );
        assert_eq!(
            c.resolve_reason("2."),
            Some("2. Боковая загрузка(задняя загрузка)")
        );
        // "2" must not match "20."
        assert_eq!(
            c.resolve_reason("20"),
            Some("20. Не полный вывоз (замерз бак)")
        );
        assert_eq!(c.resolve_reason("21"), None);
        assert_eq!(c.resolve_reason(""), None);
    }

    #[test]
    fn test_reason_code_extraction() {
        assert_eq!(Catalog::reason_code("2. Боковая загрузка"), "2.");
        assert_eq!(Catalog::reason_code("20. Не полный вывоз"), "20.");
        assert_eq!(Catalog::reason_code("без кода"), "без кода");
    }

    #[test]
    fn test_known_zone() {
        let c = catalog();
        assert!(c.is_known_zone("Левобережная"));
        assert!(!c.is_known_zone("Марсианская"));
    }
}
