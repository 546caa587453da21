use crate::datom::intern::interner;
use sha2::{Digest, Sha256};
use std::{cmp::Ordering, fmt, hash::Hash, hash::Hasher, sync::Arc};

const HASHED_FIELD_MARKER: u8 = 0xFF;

///
/// Keyword
///
/// Conceptual attribute name in `":ns/name"` form. The storage field is a
/// fixed 32-byte column: literal bytes zero-padded when the name fits,
/// otherwise a marker byte plus a truncated SHA-256 of the name.
///
/// Interned: equal keywords share one canonical instance, and the
/// field-to-keyword cache lets key decoding reuse the same instance
/// instead of re-allocating the name per scanned datom.
///

#[derive(Clone)]
pub struct Keyword(Arc<KeywordInner>);

#[derive(Debug)]
struct KeywordInner {
    name: String,
    field: [u8; Keyword::FIELD_LEN],
}

impl Keyword {
    pub const FIELD_LEN: usize = 32;

    /// Canonicalize an attribute name through the global interning tables.
    ///
    /// Names must not contain NUL bytes; the zero-padded storage field
    /// relies on that to stay unambiguous.
    #[must_use]
    pub fn intern(name: &str) -> Self {
        debug_assert!(!name.is_empty());
        debug_assert!(!name.as_bytes().contains(&0));

        if let Some(existing) = interner().keywords.get(name) {
            return existing.clone();
        }

        let keyword = Self(Arc::new(KeywordInner {
            name: name.to_string(),
            field: field_for_name(name),
        }));

        let tables = interner();
        let canonical = tables
            .keywords
            .entry(name.to_string())
            .or_insert_with(|| keyword.clone())
            .clone();
        tables
            .attr_fields
            .entry(canonical.0.field)
            .or_insert_with(|| canonical.clone());

        canonical
    }

    /// Resolve a storage field back to a keyword through the shared
    /// attribute cache. Unknown hashed fields yield a stable synthetic
    /// `:opaque/<hex>` name; the bytes round-trip regardless.
    #[must_use]
    pub(crate) fn from_field(field: &[u8; Self::FIELD_LEN]) -> Self {
        if let Some(existing) = interner().attr_fields.get(field) {
            return existing.clone();
        }

        if field[0] == HASHED_FIELD_MARKER {
            let mut name = String::with_capacity(8 + Self::FIELD_LEN * 2);
            name.push_str(":opaque/");
            for byte in &field[1..] {
                use std::fmt::Write;
                let _ = write!(name, "{byte:02x}");
            }

            let keyword = Self(Arc::new(KeywordInner {
                name,
                field: *field,
            }));
            return interner()
                .attr_fields
                .entry(*field)
                .or_insert_with(|| keyword.clone())
                .clone();
        }

        let trimmed = field
            .iter()
            .position(|&byte| byte == 0)
            .map_or(&field[..], |end| &field[..end]);
        let name = String::from_utf8_lossy(trimmed);

        Self::intern(&name)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[must_use]
    pub fn field(&self) -> &[u8; Self::FIELD_LEN] {
        &self.0.field
    }
}

fn field_for_name(name: &str) -> [u8; Keyword::FIELD_LEN] {
    let mut field = [0u8; Keyword::FIELD_LEN];
    let bytes = name.as_bytes();

    if bytes.len() <= Keyword::FIELD_LEN {
        field[..bytes.len()].copy_from_slice(bytes);
    } else {
        let digest = Sha256::digest(bytes);
        field[0] = HASHED_FIELD_MARKER;
        field[1..].copy_from_slice(&digest[..Keyword::FIELD_LEN - 1]);
    }

    field
}

impl PartialEq for Keyword {
    fn eq(&self, other: &Self) -> bool {
        self.0.field == other.0.field
    }
}

impl Eq for Keyword {}

impl Hash for Keyword {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.field.hash(state);
    }
}

impl Ord for Keyword {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.field.cmp(&other.0.field)
    }
}

impl PartialOrd for Keyword {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

impl fmt::Debug for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keyword({})", self.0.name)
    }
}

///
/// TESTS
///
