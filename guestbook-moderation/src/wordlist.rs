use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::RwLock;
use tracing::info;

/// Built-in entries used when no wordlist file is configured. Multi-word
/// entries match as contiguous phrases.
pub const PRESET_WORDS: &[&str] = &[
    "fuck",
    "fucker",
    "fucking",
    "motherfucker",
    "shit",
    "bullshit",
    "bitch",
    "asshole",
    "bastard",
    "cunt",
    "dick",
    "dickhead",
    "pussy",
    "slut",
    "whore",
    "wanker",
    "twat",
    "prick",
    "cock",
    "douchebag",
    "jackass",
    "kys",
    "kill yourself",
    "buy cheap followers now",
    "free crypto giveaway",
    "click here to claim",
];

#[derive(Debug, thiserror::Error)]
pub enum WordlistError {
    #[error("failed to read wordlist `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed wordlist entry on line {line}: `{entry}`")]
    Malformed { line: usize, entry: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WordlistSource {
    Preset,
    /// One entry per line; blank lines and `#` comments are ignored.
    File(PathBuf),
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Pattern {
    entry: String,
    tokens: Vec<String>,
}

#[derive(Debug)]
struct LoadedWordlist {
    modified: Option<SystemTime>,
    patterns: Arc<Vec<Pattern>>,
}

/// Local profanity filter. File-backed lists are re-read whenever the file's
/// modification time changes.
#[derive(Clone, Debug)]
pub struct LexicalFilter {
    source: WordlistSource,
    loaded: Arc<RwLock<Option<LoadedWordlist>>>,
}

impl LexicalFilter {
    pub fn new(source: WordlistSource) -> Self {
        Self {
            source,
            loaded: Arc::new(RwLock::new(None)),
        }
    }

    pub fn preset() -> Self {
        Self::new(WordlistSource::Preset)
    }

    pub fn source(&self) -> &WordlistSource {
        &self.source
    }

    /// Return the first wordlist entry found in `text`, if any.
    pub async fn find_match(&self, text: &str) -> Result<Option<String>, WordlistError> {
        let patterns = self.patterns().await?;
        let tokens = tokenize(text);

        let matched = patterns.iter().find(|pattern| {
            tokens
                .windows(pattern.tokens.len())
                .any(|window| window == pattern.tokens.as_slice())
        });

        Ok(matched.map(|pattern| pattern.entry.clone()))
    }

    async fn patterns(&self) -> Result<Arc<Vec<Pattern>>, WordlistError> {
        let path = match &self.source {
            WordlistSource::Preset => {
                if let Some(loaded) = self.loaded.read().await.as_ref() {
                    return Ok(loaded.patterns.clone());
                }

                let patterns = Arc::new(preset_patterns());
                *self.loaded.write().await = Some(LoadedWordlist {
                    modified: None,
                    patterns: patterns.clone(),
                });
                return Ok(patterns);
            }
            WordlistSource::File(path) => path,
        };

        let modified = file_modified(path).await?;
        {
            let current = self.loaded.read().await;
            if let Some(loaded) = current.as_ref().filter(|loaded| loaded.modified == modified) {
                return Ok(loaded.patterns.clone());
            }
        }

        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| WordlistError::Io {
                path: path.clone(),
                source,
            })?;
        let patterns = Arc::new(parse_wordlist(&contents)?);
        info!(path = %path.display(), entries = patterns.len(), "wordlist loaded");

        *self.loaded.write().await = Some(LoadedWordlist {
            modified,
            patterns: patterns.clone(),
        });

        Ok(patterns)
    }
}

async fn file_modified(path: &Path) -> Result<Option<SystemTime>, WordlistError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|source| WordlistError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(metadata.modified().ok())
}

fn preset_patterns() -> Vec<Pattern> {
    PRESET_WORDS
        .iter()
        .map(|entry| Pattern {
            entry: (*entry).to_owned(),
            tokens: tokenize(entry),
        })
        .collect()
}

fn parse_wordlist(contents: &str) -> Result<Vec<Pattern>, WordlistError> {
    let mut patterns = Vec::new();

    for (index, line) in contents.lines().enumerate() {
        let entry = line.trim();
        if entry.is_empty() || entry.starts_with('#') {
            continue;
        }

        let tokens = tokenize(entry);
        if tokens.is_empty() {
            return Err(WordlistError::Malformed {
                line: index + 1,
                entry: entry.to_owned(),
            });
        }

        patterns.push(Pattern {
            entry: entry.to_lowercase(),
            tokens,
        });
    }

    Ok(patterns)
}

// Whole-token matching keeps e.g. "dick" out of "Dickens" and "ass" out of "class".
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}
