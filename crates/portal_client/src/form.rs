//! Step definitions and the field checks run before a step is submitted.

use chrono::NaiveDate;
use shared::error::FieldErrors;
use url::Url;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

const REQUIRED_MESSAGE: &str = "This field is required";
const URL_MESSAGE: &str = "Please enter a valid URL";
const DATE_MESSAGE: &str = "Please enter a valid date";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRule {
    /// Non-blank after trimming.
    Required,
    /// When set, an absolute URL.
    Url,
    /// When set, a `YYYY-MM-DD` date.
    Date,
    /// When both are set, this date is not earlier than the named field's.
    NotBefore(String),
    /// When set, not later than today.
    NotInFuture,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    pub rules: Vec<FieldRule>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            rules: Vec::new(),
        }
    }

    pub fn rule(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn required(self) -> Self {
        self.rule(FieldRule::Required)
    }

    pub fn url(self) -> Self {
        self.rule(FieldRule::Url)
    }

    pub fn date(self) -> Self {
        self.rule(FieldRule::Date)
    }

    fn is_required(&self) -> bool {
        self.rules.contains(&FieldRule::Required)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDefinition {
    pub title: String,
    pub fields: Vec<FieldSpec>,
}

impl StepDefinition {
    pub fn new(title: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            title: title.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Checks every field against its rules. `value_of` returns the raw value
    /// the user entered, if any.
    pub fn validate<'a, F>(&self, value_of: F, today: NaiveDate) -> Result<(), FieldErrors>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let mut errors = FieldErrors::new();

        for field in &self.fields {
            let value = value_of(&field.name).map(str::trim).unwrap_or_default();
            if value.is_empty() {
                if field.is_required() {
                    push_error(&mut errors, &field.name, REQUIRED_MESSAGE.to_string());
                }
                continue;
            }

            for rule in &field.rules {
                let message = match rule {
                    FieldRule::Required => None,
                    FieldRule::Url => Url::parse(value).err().map(|_| URL_MESSAGE.to_string()),
                    FieldRule::Date => parse_date(value).is_none().then(|| DATE_MESSAGE.to_string()),
                    FieldRule::NotBefore(other) => {
                        let other_value = value_of(other).map(str::trim).and_then(parse_date);
                        match (parse_date(value), other_value) {
                            (Some(this), Some(earliest)) if this < earliest => Some(format!(
                                "{} cannot be before {}",
                                field.label,
                                lowercase_first(self.label_of(other))
                            )),
                            _ => None,
                        }
                    }
                    FieldRule::NotInFuture => match parse_date(value) {
                        Some(date) if date > today => {
                            Some(format!("{} cannot be in the future", field.label))
                        }
                        _ => None,
                    },
                };

                if let Some(message) = message {
                    push_error(&mut errors, &field.name, message);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn label_of<'a>(&'a self, name: &'a str) -> &'a str {
        self.field(name)
            .map(|field| field.label.as_str())
            .unwrap_or(name)
    }
}

fn lowercase_first(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

fn push_error(errors: &mut FieldErrors, field: &str, message: String) {
    errors.entry(field.to_string()).or_default().push(message);
}

/// Ordered steps of a wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardForm {
    pub steps: Vec<StepDefinition>,
}

impl WizardForm {
    pub fn new(steps: Vec<StepDefinition>) -> Self {
        Self { steps }
    }

    pub fn total_steps(&self) -> u32 {
        u32::try_from(self.steps.len()).unwrap_or(u32::MAX)
    }

    /// Steps are numbered from 1.
    pub fn step(&self, number: u32) -> Option<&StepDefinition> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.steps.get(index)
    }

    /// The faculty profile-completion form: photo, academic details, research ids.
    pub fn faculty_profile() -> Self {
        Self::new(vec![
            StepDefinition::new(
                "Profile Photo",
                vec![FieldSpec::new("profile_image", "Profile image")],
            ),
            StepDefinition::new(
                "Academic Details",
                vec![
                    FieldSpec::new("school_faculty", "School / Faculty").required(),
                    FieldSpec::new("department", "Department").required(),
                    FieldSpec::new("designation", "Designation").required(),
                    FieldSpec::new("highest_qualification", "Highest qualification").required(),
                    FieldSpec::new("area_of_specialization", "Area of specialization").required(),
                ],
            ),
            StepDefinition::new(
                "Research Identifiers",
                vec![
                    FieldSpec::new("orcid_id", "ORCID iD"),
                    FieldSpec::new("scopus_id", "Scopus ID"),
                    FieldSpec::new("google_scholar", "Google Scholar").url(),
                    FieldSpec::new("vidwaan_id", "Vidwan ID"),
                ],
            ),
        ])
    }
}

#[cfg(test)]
#[path = "tests/form_tests.rs"]
mod tests;
