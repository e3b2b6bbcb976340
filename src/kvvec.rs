//! Key/value vector: the wire format between the core and its workers.
//!
//! An ordered, duplicate-allowing association of byte strings to byte
//! strings with a compact single-separator codec. Small and simple, but
//! pretty helpful when shuttling structured data between processes that
//! both speak it.

use std::cmp::Ordering;

/// A single key/value pair. Both sides are owned byte strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl KeyValue {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered key/value vector with a sorted-flag and a byte-stream codec.
///
/// The `sorted` flag is true iff the sequence is non-decreasing under
/// [`compare_pairs`]; any insertion clears it, [`KvVec::sort`] establishes
/// it. Lookups use binary search while sorted and fall back to a linear
/// scan otherwise.
#[derive(Debug, Clone, Default)]
pub struct KvVec {
    pairs: Vec<KeyValue>,
    sorted: bool,
}

/// memcmp-style comparison: common prefix first, length breaks ties.
fn byte_compare(a: &[u8], b: &[u8]) -> Ordering {
    let prefix = a.len().min(b.len());
    match a[..prefix].cmp(&b[..prefix]) {
        Ordering::Equal => a.len().cmp(&b.len()),
        other => other,
    }
}

/// Pair ordering: key first, value breaks ties.
pub fn compare_pairs(a: &KeyValue, b: &KeyValue) -> Ordering {
    byte_compare(&a.key, &b.key).then_with(|| byte_compare(&a.value, &b.value))
}

impl KvVec {
    #[must_use]
    pub fn new() -> Self {
        KvVec::default()
    }

    /// Creates a vector with room for `hint` pairs.
    #[must_use]
    pub fn with_capacity(hint: usize) -> Self {
        KvVec {
            pairs: Vec::with_capacity(hint),
            sorted: false,
        }
    }

    /// Grows backing storage to hold at least `hint` pairs. Never shrinks.
    pub fn reserve(&mut self, hint: usize) {
        if hint > self.pairs.capacity() {
            self.pairs.reserve(hint - self.pairs.len());
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn pairs(&self) -> &[KeyValue] {
        &self.pairs
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.pairs.iter()
    }

    /// Appends a pair. Clears the sorted flag.
    pub fn push(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.pairs.push(KeyValue::new(key, value));
        self.sorted = false;
    }

    /// Convenience for string keys/values.
    pub fn push_str(&mut self, key: &str, value: &str) {
        self.push(key.as_bytes().to_vec(), value.as_bytes().to_vec());
    }

    pub fn push_u64(&mut self, key: &str, value: u64) {
        self.push_str(key, &value.to_string());
    }

    pub fn push_i64(&mut self, key: &str, value: i64) {
        self.push_str(key, &value.to_string());
    }

    /// Sorts by key (memcmp, then length), ties broken by value, and sets
    /// the sorted flag.
    pub fn sort(&mut self) {
        self.pairs.sort_by(compare_pairs);
        self.sorted = true;
    }

    /// Looks a key up. On a sorted vector this is a binary search that
    /// walks back to the *first* entry with the key; otherwise a linear
    /// scan, which also yields the first match.
    pub fn fetch(&self, key: &[u8]) -> Option<&KeyValue> {
        if self.sorted {
            let mut low = 0usize;
            let mut high = self.pairs.len();
            while low < high {
                let mid = (low + high) / 2;
                match byte_compare(&self.pairs[mid].key, key) {
                    Ordering::Greater => high = mid,
                    Ordering::Less => low = mid + 1,
                    Ordering::Equal => {
                        // rewind to the first pair carrying this key
                        let mut first = mid;
                        while first > 0 && self.pairs[first - 1].key == key {
                            first -= 1;
                        }
                        return Some(&self.pairs[first]);
                    }
                }
            }
            return None;
        }
        self.pairs.iter().find(|kv| kv.key == key)
    }

    /// String-typed fetch; `None` when absent or not valid UTF-8.
    pub fn fetch_str(&self, key: &str) -> Option<&str> {
        self.fetch(key.as_bytes())
            .and_then(|kv| std::str::from_utf8(&kv.value).ok())
    }

    /// Encodes to `key<kv_sep>value<pair_sep>…` with `overalloc` zero bytes
    /// appended past the payload. A zero-length value still produces
    /// `key<kv_sep><pair_sep>`.
    #[must_use]
    pub fn encode(&self, kv_sep: u8, pair_sep: u8, overalloc: usize) -> Vec<u8> {
        let payload: usize = self
            .pairs
            .iter()
            .map(|kv| kv.key.len() + kv.value.len() + 2)
            .sum();
        let mut buf = Vec::with_capacity(payload + overalloc);
        for kv in &self.pairs {
            buf.extend_from_slice(&kv.key);
            buf.push(kv_sep);
            if !kv.value.is_empty() {
                buf.extend_from_slice(&kv.value);
            }
            buf.push(pair_sep);
        }
        buf.resize(buf.len() + overalloc, 0);
        buf
    }

    /// Length of the encoded payload, excluding any overallocation.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.pairs
            .iter()
            .map(|kv| kv.key.len() + kv.value.len() + 2)
            .sum()
    }

    /// Decodes a buffer produced by [`KvVec::encode`], appending pairs to
    /// `self`. Returns the number of pairs parsed.
    ///
    /// Grammar rules: keys cannot begin with a zero byte (it acts as a hard
    /// terminator); the final pair may omit its pair separator; a non-final
    /// pair missing one ends decoding early. Keys and values are copied out
    /// of the buffer.
    pub fn decode(&mut self, buf: &[u8], kv_sep: u8, pair_sep: u8) -> usize {
        if buf.is_empty() {
            return 0;
        }
        let mut parsed = 0usize;
        let mut offset = 0usize;
        while offset < buf.len() {
            if buf[offset] == 0 {
                break;
            }
            let Some(key_end) = memchr(kv_sep, &buf[offset..]) else {
                break;
            };
            let key_end = offset + key_end;
            let val_start = key_end + 1;
            let (val_end, consumed_sep) = match memchr(pair_sep, &buf[val_start..]) {
                Some(p) => (val_start + p, true),
                // last pair doesn't need a pair separator
                None => (buf.len(), false),
            };
            self.pairs.push(KeyValue::new(
                buf[offset..key_end].to_vec(),
                buf[val_start..val_end].to_vec(),
            ));
            parsed += 1;
            offset = if consumed_sep { val_end + 1 } else { buf.len() };
        }
        if parsed > 0 {
            self.sorted = false;
        }
        parsed
    }

    /// One-shot decode into a fresh vector.
    #[must_use]
    pub fn from_buf(buf: &[u8], kv_sep: u8, pair_sep: u8) -> Self {
        let mut kvv = KvVec::with_capacity(buf.len() / 20);
        kvv.decode(buf, kv_sep, pair_sep);
        kvv
    }
}

fn memchr(needle: u8, haystack: &[u8]) -> Option<usize> {
    haystack.iter().position(|&b| b == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> KvVec {
        let mut kvv = KvVec::new();
        kvv.push_str("zulu", "last");
        kvv.push_str("alpha", "first");
        kvv.push_str("mike", "middle");
        kvv.push_str("alpha", "second");
        kvv
    }

    #[test]
    fn push_clears_sorted() {
        let mut kvv = sample();
        kvv.sort();
        assert!(kvv.is_sorted());
        kvv.push_str("new", "pair");
        assert!(!kvv.is_sorted());
    }

    #[test]
    fn sort_orders_by_key_then_value() {
        let mut kvv = sample();
        kvv.sort();
        for w in kvv.pairs().windows(2) {
            assert_ne!(compare_pairs(&w[0], &w[1]), Ordering::Greater);
        }
        assert_eq!(kvv.pairs()[0].key, b"alpha");
        assert_eq!(kvv.pairs()[0].value, b"first");
    }

    #[test]
    fn fetch_finds_first_match_when_sorted() {
        let mut kvv = sample();
        kvv.sort();
        let hit = kvv.fetch(b"alpha").expect("alpha present");
        assert_eq!(hit.value, b"first");
        assert!(kvv.fetch(b"nonexistent").is_none());
    }

    #[test]
    fn key_length_breaks_memcmp_ties() {
        let mut kvv = KvVec::new();
        kvv.push_str("abc", "1");
        kvv.push_str("ab", "2");
        kvv.sort();
        assert_eq!(kvv.pairs()[0].key, b"ab");
    }

    #[test]
    fn roundtrip_with_empty_value() {
        let mut kvv = KvVec::new();
        kvv.push_str("key", "");
        kvv.push_str("other", "value");
        let buf = kvv.encode(b'=', b';', 0);
        assert_eq!(buf, b"key=;other=value;");
        let back = KvVec::from_buf(&buf, b'=', b';');
        assert_eq!(back.pairs(), kvv.pairs());
    }

    #[test]
    fn trailing_pair_without_separator_decodes() {
        let back = KvVec::from_buf(b"a=1;b=2", b'=', b';');
        assert_eq!(back.len(), 2);
        assert_eq!(back.fetch_str("b"), Some("2"));
    }

    #[test]
    fn nul_key_terminates_decoding() {
        let back = KvVec::from_buf(b"a=1;\0oops=2;", b'=', b';');
        assert_eq!(back.len(), 1);
    }

    #[test]
    fn overalloc_pads_with_zeroes() {
        let mut kvv = KvVec::new();
        kvv.push_str("k", "v");
        let buf = kvv.encode(b'=', b';', 4);
        assert_eq!(&buf[buf.len() - 4..], &[0, 0, 0, 0]);
        assert_eq!(kvv.encoded_len(), buf.len() - 4);
    }
}
