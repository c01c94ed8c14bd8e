use serde::Serialize;

pub const NAME_MIN_LEN: usize = 2;
pub const NAME_MAX_LEN: usize = 32;
pub const MESSAGE_MIN_LEN: usize = 2;
pub const MESSAGE_MAX_LEN: usize = 140;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Name,
    Message,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Message => "message",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Message => "Message",
        }
    }

    fn length_bounds(self) -> (usize, usize) {
        match self {
            Self::Name => (NAME_MIN_LEN, NAME_MAX_LEN),
            Self::Message => (MESSAGE_MIN_LEN, MESSAGE_MAX_LEN),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

/// Check one field. Returns the first constraint it breaks.
pub fn validate_field(field: Field, value: &str) -> Option<FieldError> {
    let (min, max) = field.length_bounds();
    let length = value.chars().count();

    let message = if value.is_empty() {
        format!("{} is required.", field.label())
    } else if length < min {
        format!("{} must be at least {min} characters.", field.label())
    } else if length > max {
        format!("{} must be at most {max} characters.", field.label())
    } else if !is_printable_ascii(value) {
        format!(
            "{} may only contain standard keyboard characters.",
            field.label()
        )
    } else {
        return None;
    };

    Some(FieldError { field, message })
}

/// Validate a submission. `name` is `None` when the identity came from the
/// session provider and is not subject to validation.
pub fn validate_submission(name: Option<&str>, message: &str) -> Vec<FieldError> {
    let name_error = name.and_then(|name| validate_field(Field::Name, name));
    let message_error = validate_field(Field::Message, message);

    name_error.into_iter().chain(message_error).collect()
}

fn is_printable_ascii(value: &str) -> bool {
    value.bytes().all(|byte| (0x20..=0x7e).contains(&byte))
}
