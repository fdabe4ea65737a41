//! Short display labels for intervention titles.

use std::collections::BTreeMap;

/// Built-in labels for the Barcelona urban interventions dataset.
const DEFAULT_LABELS: &[(&str, &str)] = &[
    (
        "Urbanització c. Almogàvers (Badajoz -Roc Boronat).",
        "Almogàvers",
    ),
    ("Superilla de Poblenou", "Superilla Poblenou"),
    ("Eixos Verds Eixample", "Eixample"),
    (
        "Supermanzana EJE VERDE (Consell de cent, Rocafort, Conde Borrell y Girona)",
        "Superilla EixVerd",
    ),
    (
        "Eixos Verds LOT 4: Consell de Cent (Aribau - Rambla Catalunya)",
        "LOT 4",
    ),
    (
        "Eje verde de la calle de Girona entre la calle de la Diputació y la Gran Via de les Corts Catalanes",
        "EixVerd Girona",
    ),
    (
        "Urbanización de tramos de las calles de Puigcerdà, Cristòbal de Moura i Veneçuela",
        "Urbanització PCV",
    ),
    (
        "Supermanzana EJE VERDE Consejo de Ciento con Rocafort, Conde Borrell, Enric Granados y Girona",
        "Consell de Cent",
    ),
    (
        "Eixos Verds LOT 2: Borrell (Aragó - Diputació) + Consell de Cent (Calàbria - Urgell) + Cruïlla",
        "LOT 2",
    ),
    ("Eixos Verds LOT 1:", "LOT 1"),
    ("Eix verd Sant Antoni", "Sant Antoni"),
];

/// Maps full intervention titles to the short labels shown on windows.
///
/// Titles are compared after trimming surrounding whitespace. Titles
/// without an entry are labelled with the trimmed title itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterventionLabels {
    labels: BTreeMap<String, String>,
}

impl Default for InterventionLabels {
    fn default() -> Self {
        Self::new(
            DEFAULT_LABELS
                .iter()
                .map(|&(title, label)| (title.to_string(), label.to_string())),
        )
    }
}

impl InterventionLabels {
    /// Builds a table from (title, label) pairs.
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self::empty().with_overrides(entries)
    }

    /// A table with no entries; every title labels itself.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            labels: BTreeMap::new(),
        }
    }

    /// Adds or replaces entries.
    #[must_use]
    pub fn with_overrides(mut self, entries: impl IntoIterator<Item = (String, String)>) -> Self {
        self.labels.extend(
            entries
                .into_iter()
                .map(|(title, label)| (title.trim().to_string(), label.trim().to_string())),
        );
        self
    }

    /// Short label for `title`.
    #[must_use]
    pub fn label(&self, title: &str) -> String {
        let title = title.trim();
        self.labels
            .get(title)
            .map_or_else(|| title.to_string(), Clone::clone)
    }

    /// Number of explicit entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` if there are no explicit entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Explicit (title, label) entries in title order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels
            .iter()
            .map(|(title, label)| (title.as_str(), label.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_ignores_surrounding_whitespace() {
        let labels = InterventionLabels::default();
        assert_eq!(labels.len(), 11);
        assert_eq!(labels.label("Eixos Verds Eixample "), "Eixample");
        assert_eq!(labels.label("Eixos Verds LOT 1: "), "LOT 1");
        assert_eq!(labels.label("Superilla de Poblenou"), "Superilla Poblenou");
    }

    #[test]
    fn unknown_title_falls_back_to_trimmed_title() {
        let labels = InterventionLabels::default();
        assert_eq!(labels.label("  Nova plaça  "), "Nova plaça");
    }

    #[test]
    fn overrides_replace_defaults() {
        let labels = InterventionLabels::default().with_overrides([(
            "Eix verd Sant Antoni ".to_string(),
            "St. Antoni".to_string(),
        )]);
        assert_eq!(labels.label("Eix verd Sant Antoni"), "St. Antoni");
        assert_eq!(labels.len(), 11);
    }
}
