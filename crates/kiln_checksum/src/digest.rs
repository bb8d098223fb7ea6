//! Canonical rendering of checksummable values.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use kiln_common::{ContentHash, ContentHasher, Identifier};
use kiln_model::{
    CodeSnippet, Configuration, Content, Document, DocumentCollection, Item, ItemRep, Layout,
    RepName, Value,
};

use crate::error::ChecksumError;

/// Receives the canonical rendering of a value.
///
/// Implementors only provide [`DigestSink::write_str`]; the structural
/// helpers are shared so that every sink sees the exact same byte stream.
pub trait DigestSink: Sized {
    /// Appends raw text to the rendering.
    fn write_str(&mut self, s: &str);

    /// Renders `len:text`, with the byte length of `text`, so that text
    /// containing delimiters cannot be mistaken for structure.
    fn length_prefixed(&mut self, text: &str) {
        self.write_str(&text.len().to_string());
        self.write_str(":");
        self.write_str(text);
    }

    /// Renders `tag<…>` around whatever `body` writes.
    fn tagged<F>(&mut self, tag: &str, body: F) -> Result<(), ChecksumError>
    where
        F: FnOnce(&mut Self) -> Result<(), ChecksumError>,
    {
        self.write_str(tag);
        self.write_str("<");
        body(self)?;
        self.write_str(">");
        Ok(())
    }

    /// Renders `name=value`.
    fn field<T: Checksummable + ?Sized>(
        &mut self,
        name: &str,
        value: &T,
    ) -> Result<(), ChecksumError> {
        self.write_str(name);
        self.write_str("=");
        value.update(self)
    }

    /// Renders `tag<elem,elem,>`.
    fn sequence<'a, T, I>(&mut self, tag: &str, elements: I) -> Result<(), ChecksumError>
    where
        T: Checksummable + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        self.tagged(tag, |sink| {
            for element in elements {
                element.update(sink)?;
                sink.write_str(",");
            }
            Ok(())
        })
    }

    /// Renders `tag<String<n:key>=value,>` in the iteration order of `entries`.
    fn table<'a, T, I>(&mut self, tag: &str, entries: I) -> Result<(), ChecksumError>
    where
        T: Checksummable + 'a,
        I: IntoIterator<Item = (&'a String, &'a T)>,
    {
        self.tagged(tag, |sink| {
            for (key, value) in entries {
                key.as_str().update(sink)?;
                sink.write_str("=");
                value.update(sink)?;
                sink.write_str(",");
            }
            Ok(())
        })
    }
}

/// A value with a structural checksum.
pub trait Checksummable {
    /// Writes the canonical rendering of `self` into `sink`.
    fn update<S: DigestSink>(&self, sink: &mut S) -> Result<(), ChecksumError>;
}

/// Sink that accumulates the canonical rendering as text.
#[derive(Debug, Default)]
pub struct VerboseDigest {
    buf: String,
}

impl VerboseDigest {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the accumulated rendering.
    pub fn finish(self) -> String {
        self.buf
    }
}

impl DigestSink for VerboseDigest {
    fn write_str(&mut self, s: &str) {
        self.buf.push_str(s);
    }
}

/// Sink that streams the canonical rendering into an XXH3-128 hasher.
#[derive(Default)]
pub struct CompactDigest {
    hasher: ContentHasher,
}

impl CompactDigest {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the hash of the rendering.
    pub fn finish(&self) -> ContentHash {
        self.hasher.finish()
    }
}

impl DigestSink for CompactDigest {
    fn write_str(&mut self, s: &str) {
        self.hasher.update(s.as_bytes());
    }
}

/// Returns the canonical rendering of a value.
pub fn canonical<T: Checksummable + ?Sized>(value: &T) -> Result<String, ChecksumError> {
    let mut sink = VerboseDigest::new();
    value.update(&mut sink)?;
    Ok(sink.finish())
}

/// Returns the checksum of a value.
pub fn digest<T: Checksummable + ?Sized>(value: &T) -> Result<ContentHash, ChecksumError> {
    let mut sink = CompactDigest::new();
    value.update(&mut sink)?;
    Ok(sink.finish())
}

fn file_hash(path: &Path) -> Result<ContentHash, ChecksumError> {
    let unreadable = |source| ChecksumError::Unreadable {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(unreadable)?;
    let mut hasher = ContentHasher::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(unreadable)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finish())
}

impl<T: Checksummable + ?Sized> Checksummable for &T {
    fn update<S: DigestSink>(&self, sink: &mut S) -> Result<(), ChecksumError> {
        (**self).update(sink)
    }
}

impl Checksummable for str {
    fn update<S: DigestSink>(&self, sink: &mut S) -> Result<(), ChecksumError> {
        sink.tagged("String", |sink| {
            sink.length_prefixed(self);
            Ok(())
        })
    }
}

impl Checksummable for String {
    fn update<S: DigestSink>(&self, sink: &mut S) -> Result<(), ChecksumError> {
        self.as_str().update(sink)
    }
}

impl<T: Checksummable> Checksummable for [T] {
    fn update<S: DigestSink>(&self, sink: &mut S) -> Result<(), ChecksumError> {
        sink.sequence("Array", self)
    }
}

impl<T: Checksummable> Checksummable for Vec<T> {
    fn update<S: DigestSink>(&self, sink: &mut S) -> Result<(), ChecksumError> {
        self.as_slice().update(sink)
    }
}

impl<T: Checksummable> Checksummable for BTreeMap<String, T> {
    fn update<S: DigestSink>(&self, sink: &mut S) -> Result<(), ChecksumError> {
        sink.table("Table", self)
    }
}

impl Checksummable for Identifier {
    fn update<S: DigestSink>(&self, sink: &mut S) -> Result<(), ChecksumError> {
        sink.tagged("Identifier", |sink| self.as_str().update(sink))
    }
}

impl Checksummable for RepName {
    fn update<S: DigestSink>(&self, sink: &mut S) -> Result<(), ChecksumError> {
        sink.tagged("Symbol", |sink| {
            sink.length_prefixed(self.as_str());
            Ok(())
        })
    }
}

impl Checksummable for Value {
    fn update<S: DigestSink>(&self, sink: &mut S) -> Result<(), ChecksumError> {
        match self {
            Value::Null => sink.tagged("Null", |_| Ok(())),
            Value::Bool(b) => sink.tagged("Bool", |sink| {
                sink.write_str(if *b { "true" } else { "false" });
                Ok(())
            }),
            Value::Integer(i) => sink.tagged("Integer", |sink| {
                sink.write_str(&i.to_string());
                Ok(())
            }),
            Value::Float(x) => sink.tagged("Float", |sink| {
                sink.write_str(&x.to_string());
                Ok(())
            }),
            Value::String(s) => s.update(sink),
            Value::Array(items) => items.update(sink),
            Value::Table(entries) => entries.update(sink),
        }
    }
}

impl Checksummable for Content {
    fn update<S: DigestSink>(&self, sink: &mut S) -> Result<(), ChecksumError> {
        match self {
            Content::Textual(text) => sink.tagged("TextualContent", |sink| text.update(sink)),
            Content::Binary(path) => {
                let hash = file_hash(path)?;
                sink.tagged("BinaryContent", |sink| {
                    sink.write_str(&hash.to_string());
                    Ok(())
                })
            }
        }
    }
}

fn update_document<D: Document, S: DigestSink>(
    doc: &D,
    sink: &mut S,
) -> Result<(), ChecksumError> {
    sink.tagged(D::KIND.tag(), |sink| {
        sink.field("content", doc.content())?;
        sink.write_str(",");
        sink.field("attributes", doc.attributes())?;
        sink.write_str(",");
        sink.field("identifier", doc.identifier())
    })
}

impl Checksummable for Item {
    fn update<S: DigestSink>(&self, sink: &mut S) -> Result<(), ChecksumError> {
        update_document(self, sink)
    }
}

impl Checksummable for Layout {
    fn update<S: DigestSink>(&self, sink: &mut S) -> Result<(), ChecksumError> {
        update_document(self, sink)
    }
}

impl Checksummable for ItemRep {
    fn update<S: DigestSink>(&self, sink: &mut S) -> Result<(), ChecksumError> {
        sink.tagged("ItemRep", |sink| {
            sink.field("item", &self.item)?;
            sink.write_str(",");
            sink.field("name", &self.name)
        })
    }
}

impl Checksummable for Configuration {
    fn update<S: DigestSink>(&self, sink: &mut S) -> Result<(), ChecksumError> {
        sink.table("Configuration", self.iter())
    }
}

impl Checksummable for CodeSnippet {
    fn update<S: DigestSink>(&self, sink: &mut S) -> Result<(), ChecksumError> {
        sink.tagged("CodeSnippet", |sink| self.data.update(sink))
    }
}

impl<D: Document + Checksummable> Checksummable for DocumentCollection<D> {
    fn update<S: DigestSink>(&self, sink: &mut S) -> Result<(), ChecksumError> {
        sink.write_str(D::KIND.tag());
        sink.sequence("Collection", self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_model::Attributes;
    use std::io::Write;

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    fn config() -> Configuration {
        Configuration::new("/site", BTreeMap::new())
    }

    #[test]
    fn string() {
        assert_eq!(canonical("abc").unwrap(), "String<3:abc>");
    }

    #[test]
    fn delimiters_in_text_cannot_forge_structure() {
        let mut one = BTreeMap::new();
        one.insert("a".to_string(), Value::from("1>,String<b>=String<2"));
        let mut two = BTreeMap::new();
        two.insert("a".to_string(), Value::from("1"));
        two.insert("b".to_string(), Value::from("2"));
        assert_ne!(canonical(&one).unwrap(), canonical(&two).unwrap());
        assert_ne!(digest(&one).unwrap(), digest(&two).unwrap());
        assert_eq!(canonical("a>b").unwrap(), "String<3:a>b>");
    }

    #[test]
    fn identifier() {
        assert_eq!(
            canonical(&id("/foo.md")).unwrap(),
            "Identifier<String<7:/foo.md>>"
        );
    }

    #[test]
    fn scalars_and_nesting() {
        let value = Value::from(vec![
            Value::Integer(1),
            Value::Float(1.5),
            Value::Null,
            Value::Bool(true),
        ]);
        assert_eq!(
            canonical(&value).unwrap(),
            "Array<Integer<1>,Float<1.5>,Null<>,Bool<true>,>"
        );
    }

    #[test]
    fn table_is_sorted() {
        let mut entries = BTreeMap::new();
        entries.insert("b".to_string(), Value::from("2"));
        entries.insert("a".to_string(), Value::from("1"));
        assert_eq!(
            canonical(&Value::Table(entries)).unwrap(),
            "Table<String<1:a>=String<1:1>,String<1:b>=String<1:2>,>"
        );
    }

    #[test]
    fn code_snippet() {
        let snippet = CodeSnippet::new("asdf", "lib/foo.rb");
        assert_eq!(canonical(&snippet).unwrap(), "CodeSnippet<String<4:asdf>>");
    }

    #[test]
    fn item() {
        let item = Item::new("asdf", Attributes::new(), id("/foo.md"));
        assert_eq!(
            canonical(&item).unwrap(),
            "Item<content=TextualContent<String<4:asdf>>,attributes=Table<>,\
             identifier=Identifier<String<7:/foo.md>>>"
        );
    }

    #[test]
    fn layout() {
        let layout = Layout::new("asdf", Attributes::new(), id("/foo.md"));
        assert_eq!(
            canonical(&layout).unwrap(),
            "Layout<content=TextualContent<String<4:asdf>>,attributes=Table<>,\
             identifier=Identifier<String<7:/foo.md>>>"
        );
    }

    #[test]
    fn item_rep() {
        let rep = ItemRep::new(id("/foo.md"), RepName::new("pdf"));
        assert_eq!(
            canonical(&rep).unwrap(),
            "ItemRep<item=Identifier<String<7:/foo.md>>,name=Symbol<3:pdf>>"
        );
    }

    #[test]
    fn configuration() {
        let mut entries = BTreeMap::new();
        entries.insert("foo".to_string(), Value::from("bar"));
        let config = Configuration::new("/site", entries);
        assert_eq!(
            canonical(&config).unwrap(),
            "Configuration<String<3:foo>=String<3:bar>,>"
        );
    }

    #[test]
    fn item_collection() {
        let items = DocumentCollection::new(
            &config(),
            vec![
                Item::new("foo", Attributes::new(), id("/foo.md")),
                Item::new("bar", Attributes::new(), id("/bar.md")),
            ],
        )
        .unwrap();
        assert_eq!(
            canonical(&items).unwrap(),
            "ItemCollection<\
             Item<content=TextualContent<String<3:foo>>,attributes=Table<>,identifier=Identifier<String<7:/foo.md>>>,\
             Item<content=TextualContent<String<3:bar>>,attributes=Table<>,identifier=Identifier<String<7:/bar.md>>>,>"
        );
    }

    #[test]
    fn compact_matches_verbose() {
        let item = Item::new("asdf", Attributes::new(), id("/foo.md"));
        let text = canonical(&item).unwrap();
        assert_eq!(digest(&item).unwrap(), ContentHash::from_bytes(text.as_bytes()));
    }

    #[test]
    fn sensitive_to_attributes_content_and_identifier() {
        let mut attrs = Attributes::new();
        attrs.insert("title".to_string(), Value::from("Hi"));
        let base = Item::new("body", attrs.clone(), id("/a.md"));

        let mut changed_attr = attrs.clone();
        changed_attr.insert("title".to_string(), Value::from("Ho"));
        let other_attr = Item::new("body", changed_attr, id("/a.md"));
        let other_content = Item::new("bodY", attrs.clone(), id("/a.md"));
        let other_id = Item::new("body", attrs, id("/b.md"));

        let d = digest(&base).unwrap();
        assert_ne!(d, digest(&other_attr).unwrap());
        assert_ne!(d, digest(&other_content).unwrap());
        assert_ne!(d, digest(&other_id).unwrap());
        assert_eq!(d, digest(&base.clone()).unwrap());
    }

    #[test]
    fn attribute_order_irrelevant() {
        let mut a = Attributes::new();
        a.insert("x".to_string(), Value::from(1i64));
        a.insert("y".to_string(), Value::from(2i64));
        let mut b = Attributes::new();
        b.insert("y".to_string(), Value::from(2i64));
        b.insert("x".to_string(), Value::from(1i64));
        assert_eq!(
            digest(&Item::new("", a, id("/a.md"))).unwrap(),
            digest(&Item::new("", b, id("/a.md"))).unwrap()
        );
    }

    #[test]
    fn binary_content_uses_file_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"\x89PNG")
            .unwrap();

        let content = Content::Binary(path.clone());
        let expected = format!("BinaryContent<{}>", ContentHash::from_bytes(b"\x89PNG"));
        assert_eq!(canonical(&content).unwrap(), expected);

        let before = digest(&content).unwrap();
        std::fs::write(&path, b"\x89PNH").unwrap();
        assert_ne!(before, digest(&content).unwrap());
    }

    #[test]
    fn binary_content_same_bytes_different_path() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        std::fs::write(&a, b"same").unwrap();
        std::fs::write(&b, b"same").unwrap();
        assert_eq!(
            digest(&Content::Binary(a)).unwrap(),
            digest(&Content::Binary(b)).unwrap()
        );
    }

    #[test]
    fn missing_binary_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let content = Content::Binary(dir.path().join("missing.png"));
        let err = digest(&content).unwrap_err();
        assert!(matches!(err, ChecksumError::Unreadable { .. }));
    }
}
