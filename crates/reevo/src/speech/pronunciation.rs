use regex::{NoExpand, Regex, RegexBuilder};

const DEFAULT_PRONUNCIATIONS: &[(&str, &str)] = &[
    ("Reevo", "Reee Vo"),
    ("API", "A P I"),
    ("CRM", "C R M"),
    ("LiveKit", "Live Kit"),
    ("JWT", "J W T"),
    ("HTTP", "H T T P"),
    ("URL", "U R L"),
    ("SQL", "sequel"),
    ("AI", "A I"),
];

/// Whole word, case insensitive spelling fixes applied to text before synthesis
#[derive(Debug, Clone)]
pub struct Pronunciations {
    rules: Vec<(Regex, String)>,
}

impl Pronunciations {
    pub fn new<I, T, P>(rules: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = (T, P)>,
        T: AsRef<str>,
        P: Into<String>,
    {
        let rules = rules
            .into_iter()
            .map(|(term, spoken)| {
                let pattern = format!(r"\b{}\b", regex::escape(term.as_ref()));
                let regex = RegexBuilder::new(&pattern).case_insensitive(true).build()?;
                Ok((regex, spoken.into()))
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { rules })
    }

    /// Rules are applied in order, each one sees the output of the previous
    pub fn apply(&self, text: &str) -> String {
        self.rules
            .iter()
            .fold(text.to_string(), |text, (regex, spoken)| {
                regex.replace_all(&text, NoExpand(spoken)).into_owned()
            })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for Pronunciations {
    fn default() -> Self {
        Self::new(DEFAULT_PRONUNCIATIONS.iter().copied())
            .expect("default pronunciation patterns are valid")
    }
}
