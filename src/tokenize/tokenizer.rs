//! Pluggable tokenizers and synonym generation

/// Classified token kind.
///
/// Kinds drive two policies: the per-kind blacklist, and the overlength
/// exemption (file paths, urls and request lines routinely blow past the
/// term length limit but are worth indexing whole).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Alphanum,
    Num,
    Url,
    File,
    HttpRequest,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Alphanum => "ALPHANUM",
            TokenKind::Num => "NUM",
            TokenKind::Url => "URL",
            TokenKind::File => "FILE",
            TokenKind::HttpRequest => "HTTP_REQUEST",
        }
    }

    /// Kinds allowed to exceed the term length limit.
    pub fn exempt_from_length_limit(&self) -> bool {
        matches!(self, TokenKind::Url | TokenKind::File | TokenKind::HttpRequest)
    }

    pub fn classify(text: &str) -> TokenKind {
        if text.contains("://") {
            TokenKind::Url
        } else if text.starts_with('/') && text.len() > 1 {
            TokenKind::File
        } else if text
            .split_once(' ')
            .map(|(verb, rest)| {
                matches!(verb, "GET" | "POST" | "PUT" | "HEAD" | "DELETE") && rest.starts_with('/')
            })
            .unwrap_or(false)
        {
            TokenKind::HttpRequest
        } else if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
            TokenKind::Num
        } else {
            TokenKind::Alphanum
        }
    }
}

/// Token produced by a tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,

    /// Positions advanced past the previous token; >1 encodes a gap,
    /// 0 stacks this token on the previous position (synonym streams)
    pub position_increment: u32,
}

/// Tokenizer trait for pluggable text analysis.
pub trait Tokenizer: Send + Sync {
    /// Tokenize text into a list of tokens
    fn tokenize(&self, text: &str) -> Vec<Token>;

    /// Get tokenizer name
    fn name(&self) -> &str;
}

/// Default content tokenizer: split on whitespace, trim punctuation,
/// classify, preserve original case (normalization is the synonym
/// generator's job).
#[derive(Debug, Clone, Default)]
pub struct ContentTokenizer;

impl Tokenizer for ContentTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        text.split_whitespace()
            .filter_map(|raw| {
                let trimmed = raw.trim_matches(|c: char| {
                    c.is_ascii_punctuation() && !matches!(c, '/' | ':' | '.' | '_' | '-')
                });
                if trimmed.is_empty() {
                    return None;
                }
                Some(Token {
                    text: trimmed.to_string(),
                    kind: TokenKind::classify(trimmed),
                    position_increment: 1,
                })
            })
            .collect()
    }

    fn name(&self) -> &str {
        "content"
    }
}

/// Expands a token into the index-entry variants that share its position.
pub trait SynonymGenerator: Send + Sync {
    /// Variants of `term`, excluding the term itself.
    fn synonyms(&self, term: &str, kind: TokenKind) -> Vec<String>;
}

/// Case-folding and punctuation-stripping variants.
#[derive(Debug, Clone, Default)]
pub struct BasicSynonyms;

impl SynonymGenerator for BasicSynonyms {
    fn synonyms(&self, term: &str, kind: TokenKind) -> Vec<String> {
        let mut variants = Vec::new();
        let lowered = term.to_lowercase();
        if lowered != term {
            variants.push(lowered.clone());
        }
        if !matches!(kind, TokenKind::Url | TokenKind::File) {
            let stripped: String = lowered
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect();
            if !stripped.is_empty() && stripped != lowered && stripped != term {
                variants.push(stripped);
            }
        }
        variants
    }
}
