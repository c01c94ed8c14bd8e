use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::classifier::{ClassifierClient, flagged_label};
use crate::wordlist::{LexicalFilter, WordlistSource};

/// What a stage does when it cannot reach a verdict because of its own fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureMode {
    /// Log the fault and let the submission continue to the next stage.
    Open,
    /// Reject the submission as unverifiable.
    Closed,
}

impl FromStr for FailureMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(anyhow::anyhow!("unknown failure mode `{other}`")),
        }
    }
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Closed => "closed",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    Profanity,
    Toxicity,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Profanity => "Profanity detected.",
            Self::Toxicity => "Message rejected as inappropriate.",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Rejected(RejectReason),
    /// A fail-closed stage could not run.
    Unavailable,
}

#[derive(Clone, Copy, Debug)]
pub struct ModerationInput<'a> {
    pub name: &'a str,
    pub message: &'a str,
    /// Names supplied by the session provider are not run through the lexical filter.
    pub name_is_trusted: bool,
}

/// Lexical filter followed by the optional remote classifier.
#[derive(Clone, Debug)]
pub struct ModerationChain {
    lexical: LexicalFilter,
    lexical_failure: FailureMode,
    classifier: Option<ClassifierClient>,
    classifier_failure: FailureMode,
}

impl ModerationChain {
    pub fn new(lexical: LexicalFilter, classifier: Option<ClassifierClient>) -> Self {
        Self {
            lexical,
            lexical_failure: FailureMode::Open,
            classifier,
            classifier_failure: FailureMode::Closed,
        }
    }

    pub fn with_failure_modes(mut self, lexical: FailureMode, classifier: FailureMode) -> Self {
        self.lexical_failure = lexical;
        self.classifier_failure = classifier;
        self
    }

    /// Assemble the chain from `WORDLIST_PATH`, `*_FAILURE_MODE` and `CLASSIFIER_*` variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let source = env::var("WORDLIST_PATH")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .map_or(WordlistSource::Preset, |path| {
                WordlistSource::File(PathBuf::from(path))
            });

        let lexical_failure = env_failure_mode("LEXICAL_FAILURE_MODE", FailureMode::Open);
        let classifier_failure = env_failure_mode("CLASSIFIER_FAILURE_MODE", FailureMode::Closed);

        Ok(
            Self::new(LexicalFilter::new(source), ClassifierClient::from_env_optional()?)
                .with_failure_modes(lexical_failure, classifier_failure),
        )
    }

    pub fn lexical(&self) -> &LexicalFilter {
        &self.lexical
    }

    pub fn lexical_failure(&self) -> FailureMode {
        self.lexical_failure
    }

    pub fn classifier_failure(&self) -> FailureMode {
        self.classifier_failure
    }

    pub fn classifier(&self) -> Option<&ClassifierClient> {
        self.classifier.as_ref()
    }

    pub async fn review(&self, input: ModerationInput<'_>) -> Verdict {
        match self.lexical_stage(input).await {
            Verdict::Approved => {}
            other => return other,
        }

        self.classifier_stage(input).await
    }

    async fn lexical_stage(&self, input: ModerationInput<'_>) -> Verdict {
        let mut fields = vec![("message", input.message)];
        if !input.name_is_trusted {
            fields.push(("name", input.name));
        }

        for (field, text) in fields {
            match self.lexical.find_match(text).await {
                Ok(Some(entry)) => {
                    info!(field, matched = %entry, "lexical filter rejected submission");
                    return Verdict::Rejected(RejectReason::Profanity);
                }
                Ok(None) => {}
                Err(source) => {
                    return match self.lexical_failure {
                        FailureMode::Open => {
                            warn!(?source, "lexical filter failed; continuing to classifier");
                            Verdict::Approved
                        }
                        FailureMode::Closed => {
                            warn!(?source, "lexical filter failed; rejecting submission");
                            Verdict::Unavailable
                        }
                    };
                }
            }
        }

        Verdict::Approved
    }

    async fn classifier_stage(&self, input: ModerationInput<'_>) -> Verdict {
        let Some(classifier) = &self.classifier else {
            return Verdict::Approved;
        };

        let text = format!("{}: {}", input.name, input.message);
        let outcome = classifier
            .classify(&text)
            .await
            .and_then(|scores| flagged_label(&scores).map(|flag| flag.cloned()));

        match outcome {
            Ok(Some(flag)) => {
                info!(label = %flag.label, score = flag.score, "classifier rejected submission");
                Verdict::Rejected(RejectReason::Toxicity)
            }
            Ok(None) => {
                debug!("classifier approved submission");
                Verdict::Approved
            }
            Err(source) => match self.classifier_failure {
                FailureMode::Closed => {
                    warn!(?source, "classifier unavailable; rejecting submission");
                    Verdict::Unavailable
                }
                FailureMode::Open => {
                    warn!(?source, "classifier unavailable; accepting submission");
                    Verdict::Approved
                }
            },
        }
    }
}

fn env_failure_mode(key: &str, default: FailureMode) -> FailureMode {
    match env::var(key) {
        Ok(value) => value.parse().unwrap_or_else(|e| {
            warn!(?e, key, %default, "invalid failure mode; using default");
            default
        }),
        Err(_) => default,
    }
}
