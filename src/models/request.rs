use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MAX_SUBJECT_IMAGES: usize = 3;
pub const DEFAULT_SAMPLE_COUNT: u8 = 1;
pub const DEFAULT_BASE_STEPS: u8 = 32;

/// Controls whether the model may generate people.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonGeneration {
    #[default]
    AllowAdult,
    DontAllow,
    AllowAll,
}

impl PersonGeneration {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonGeneration::AllowAdult => "allow_adult",
            PersonGeneration::DontAllow => "dont_allow",
            PersonGeneration::AllowAll => "allow_all",
        }
    }
}

impl fmt::Display for PersonGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonGeneration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow_adult" => Ok(PersonGeneration::AllowAdult),
            "dont_allow" => Ok(PersonGeneration::DontAllow),
            "allow_all" => Ok(PersonGeneration::AllowAll),
            other => Err(format!(
                "unknown person generation '{}', expected allow_adult, dont_allow or allow_all",
                other
            )),
        }
    }
}

/// One uploaded picture of the subject, kept as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectImage {
    pub bytes: Vec<u8>,
    pub file_name: Option<String>,
}

impl SubjectImage {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub subject_images: Vec<SubjectImage>,
    /// What to keep from the uploaded images.
    pub subject_description: String,
    /// The new scene to synthesize around the subject.
    pub prompt: String,
    pub sample_count: u8,
    pub base_steps: u8,
    pub enhance_prompt: bool,
    pub person_generation: PersonGeneration,
    pub seed: Option<u64>,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        GenerationRequest {
            subject_images: Vec::new(),
            subject_description: String::new(),
            prompt: String::new(),
            sample_count: DEFAULT_SAMPLE_COUNT,
            base_steps: DEFAULT_BASE_STEPS,
            enhance_prompt: true,
            person_generation: PersonGeneration::default(),
            seed: None,
        }
    }
}

impl GenerationRequest {
    pub fn new(subject_description: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            subject_description: subject_description.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_image(mut self, image: SubjectImage) -> Self {
        self.subject_images.push(image);
        self
    }

    pub fn with_images(mut self, images: impl IntoIterator<Item = SubjectImage>) -> Self {
        self.subject_images.extend(images);
        self
    }

    pub fn with_sample_count(mut self, count: u8) -> Self {
        self.sample_count = count;
        self
    }

    pub fn with_base_steps(mut self, steps: u8) -> Self {
        self.base_steps = steps;
        self
    }

    pub fn with_enhance_prompt(mut self, enabled: bool) -> Self {
        self.enhance_prompt = enabled;
        self
    }

    pub fn with_person_generation(mut self, policy: PersonGeneration) -> Self {
        self.person_generation = policy;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// Interprets free-text seed input. Only plain digit strings count, with no
/// surrounding whitespace; anything else means "no seed" rather than a
/// made-up default.
pub fn parse_seed(input: &str) -> Option<u64> {
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    input.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed() {
        assert_eq!(parse_seed("12345"), Some(12345));
        assert_eq!(parse_seed(" 42 "), None);
        assert_eq!(parse_seed("42\n"), None);
        assert_eq!(parse_seed("0"), Some(0));
        assert_eq!(parse_seed(""), None);
        assert_eq!(parse_seed("   "), None);
        assert_eq!(parse_seed("-5"), None);
        assert_eq!(parse_seed("+5"), None);
        assert_eq!(parse_seed("12a"), None);
        assert_eq!(parse_seed("1.5"), None);
        assert_eq!(parse_seed("99999999999999999999999"), None);
    }

    #[test]
    fn test_person_generation_strings() {
        assert_eq!(
            "allow_all".parse::<PersonGeneration>(),
            Ok(PersonGeneration::AllowAll)
        );
        assert_eq!(
            "DONT_ALLOW".parse::<PersonGeneration>(),
            Ok(PersonGeneration::DontAllow)
        );
        assert!("everyone".parse::<PersonGeneration>().is_err());
        assert_eq!(
            serde_json::to_string(&PersonGeneration::AllowAdult).unwrap(),
            "\"allow_adult\""
        );
    }

    #[test]
    fn test_request_defaults() {
        let request = GenerationRequest::new("a red sneaker", "on a marble plinth")
            .with_image(SubjectImage::new(vec![1, 2, 3]));
        assert_eq!(request.sample_count, 1);
        assert_eq!(request.base_steps, 32);
        assert!(request.enhance_prompt);
        assert_eq!(request.person_generation, PersonGeneration::AllowAdult);
        assert_eq!(request.seed, None);
        assert_eq!(request.subject_images.len(), 1);
    }
}
