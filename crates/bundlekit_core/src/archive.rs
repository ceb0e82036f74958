//! Archive provider boundary used while assembling bundles.
//!
//! # Responsibility
//! - Parse archive URIs (`file`, `hdfs`, nested `jar:<outer>!/<inner>`).
//! - Route opens to the provider registered for the URI scheme; nested URIs
//!   open the outer archive first, then extract the entry.
//! - Map bundle archive file extensions to the archive scheme.
//!
//! Context resolution and instantiation never call into this module; only
//! bundle assembly does.

use log::debug;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Scheme for plain local files.
pub const FILE_SCHEME: &str = "file";
/// Scheme for zip-style archives, also used for custom archive extensions.
pub const JAR_SCHEME: &str = "jar";
/// Scheme for distributed file system content.
pub const HDFS_SCHEME: &str = "hdfs";

const NESTED_SEPARATOR: &str = "!/";

/// Parsed archive location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveUri {
    /// `<scheme>://<rest>`; `rest` keeps everything after `://`.
    Plain { scheme: String, rest: String },
    /// `<scheme>:<outer>!/<entry>`: an entry inside an archive.
    Nested {
        scheme: String,
        outer: Box<ArchiveUri>,
        entry: String,
    },
}

impl ArchiveUri {
    /// Parses an archive URI.
    ///
    /// # Errors
    /// - `InvalidInput` when the scheme is missing or a nested URI has no entry.
    pub fn parse(value: &str) -> io::Result<Self> {
        let trimmed = value.trim();
        let Some((scheme, remainder)) = trimmed.split_once(':') else {
            return Err(invalid_uri(trimmed));
        };
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid_uri(trimmed));
        }
        let scheme = scheme.to_ascii_lowercase();

        if let Some(rest) = remainder.strip_prefix("//") {
            return Ok(Self::Plain {
                scheme,
                rest: rest.to_string(),
            });
        }

        let Some((outer, entry)) = remainder.rsplit_once(NESTED_SEPARATOR) else {
            return Err(invalid_uri(trimmed));
        };
        if entry.is_empty() {
            return Err(invalid_uri(trimmed));
        }
        Ok(Self::Nested {
            scheme,
            outer: Box::new(Self::parse(outer)?),
            entry: entry.to_string(),
        })
    }

    /// Builds a `file://` URI for a local path.
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        Self::Plain {
            scheme: FILE_SCHEME.to_string(),
            rest: path.as_ref().to_string_lossy().into_owned(),
        }
    }

    pub fn scheme(&self) -> &str {
        match self {
            Self::Plain { scheme, .. } | Self::Nested { scheme, .. } => scheme,
        }
    }
}

impl Display for ArchiveUri {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain { scheme, rest } => write!(f, "{scheme}://{rest}"),
            Self::Nested {
                scheme,
                outer,
                entry,
            } => write!(f, "{scheme}:{outer}{NESTED_SEPARATOR}{entry}"),
        }
    }
}

fn invalid_uri(value: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("invalid archive uri: `{value}`"),
    )
}

/// Supplies readable byte streams for one URI scheme.
pub trait ArchiveProvider: Send + Sync {
    fn open(&self, uri: &ArchiveUri) -> io::Result<Box<dyn Read + Send>>;

    /// Extracts `entry` from an already opened archive stream. Providers that
    /// are not archive formats keep the default.
    fn open_entry(
        &self,
        _archive: Box<dyn Read + Send>,
        entry: &str,
    ) -> io::Result<Box<dyn Read + Send>> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("provider cannot extract entry `{entry}`"),
        ))
    }
}

/// Reads `file://` URIs from the local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileProvider;

impl ArchiveProvider for LocalFileProvider {
    fn open(&self, uri: &ArchiveUri) -> io::Result<Box<dyn Read + Send>> {
        match uri {
            ArchiveUri::Plain { scheme, rest } if scheme == FILE_SCHEME => {
                // `file:///abs` leaves `/abs` after the authority separator.
                let path = PathBuf::from(rest);
                Ok(Box::new(File::open(path)?))
            }
            other => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("local provider cannot open `{other}`"),
            )),
        }
    }
}

/// Extracts entries from zip-format archives (`.jar` and custom bundle
/// extensions).
#[derive(Debug, Default, Clone, Copy)]
pub struct JarArchiveProvider;

impl ArchiveProvider for JarArchiveProvider {
    fn open(&self, uri: &ArchiveUri) -> io::Result<Box<dyn Read + Send>> {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("archive provider needs an entry: `{uri}`"),
        ))
    }

    fn open_entry(
        &self,
        mut archive: Box<dyn Read + Send>,
        entry: &str,
    ) -> io::Result<Box<dyn Read + Send>> {
        // Zip needs random access to the central directory.
        let mut bytes = Vec::new();
        archive.read_to_end(&mut bytes)?;
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).map_err(zip_error)?;
        let mut file = zip.by_name(entry).map_err(zip_error)?;
        let mut contents = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut contents)?;
        Ok(Box::new(Cursor::new(contents)))
    }
}

fn zip_error(err: zip::result::ZipError) -> io::Error {
    match err {
        zip::result::ZipError::Io(io_err) => io_err,
        zip::result::ZipError::FileNotFound => {
            io::Error::new(io::ErrorKind::NotFound, "archive entry not found")
        }
        other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
    }
}

/// Scheme-to-provider table plus archive extension mapping.
#[derive(Default, Clone)]
pub struct ArchiveProviders {
    providers: BTreeMap<String, Arc<dyn ArchiveProvider>>,
    extensions: BTreeMap<String, String>,
}

impl ArchiveProviders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the local file and zip providers, maps `jar`, and maps each
    /// non-blank extra extension to the archive scheme.
    pub fn with_defaults<S: AsRef<str>>(extra_extensions: &[S]) -> Self {
        let mut providers = Self::new();
        for extension in extra_extensions {
            let extension = extension.as_ref().trim();
            if !extension.is_empty() {
                providers.map_extension(extension, JAR_SCHEME);
            }
        }
        providers.register(FILE_SCHEME, Arc::new(LocalFileProvider));
        providers.register(JAR_SCHEME, Arc::new(JarArchiveProvider));
        providers.map_extension(JAR_SCHEME, JAR_SCHEME);
        providers
    }

    pub fn register(&mut self, scheme: &str, provider: Arc<dyn ArchiveProvider>) {
        self.providers
            .insert(scheme.trim().to_ascii_lowercase(), provider);
    }

    pub fn map_extension(&mut self, extension: &str, scheme: &str) {
        self.extensions.insert(
            extension.trim().trim_start_matches('.').to_ascii_lowercase(),
            scheme.trim().to_ascii_lowercase(),
        );
    }

    pub fn has_provider(&self, scheme: &str) -> bool {
        self.providers.contains_key(&scheme.to_ascii_lowercase())
    }

    /// Archive scheme for a file by extension, if it is a known archive type.
    pub fn scheme_for_path(&self, path: impl AsRef<Path>) -> Option<&str> {
        let extension = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        self.extensions.get(&extension).map(String::as_str)
    }

    /// URI of `entry` inside the archive at `path`, when the file extension
    /// maps to an archive scheme.
    pub fn entry_uri(&self, path: impl AsRef<Path>, entry: &str) -> Option<ArchiveUri> {
        let path = path.as_ref();
        let scheme = self.scheme_for_path(path)?.to_string();
        Some(ArchiveUri::Nested {
            scheme,
            outer: Box::new(ArchiveUri::for_path(path)),
            entry: entry.to_string(),
        })
    }

    /// Opens `uri` with the provider registered for its scheme. A nested URI
    /// opens its outer URI through this table, then asks the provider for the
    /// entry.
    ///
    /// # Errors
    /// - `Unsupported` when no provider is registered for a scheme involved.
    /// - `NotFound` when a nested entry is missing from its archive.
    /// - Any other error the providers report.
    pub fn open(&self, uri: &ArchiveUri) -> io::Result<Box<dyn Read + Send>> {
        let Some(provider) = self.providers.get(uri.scheme()) else {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("no archive provider for scheme `{}`", uri.scheme()),
            ));
        };
        debug!(
            "event=archive_open module=archive status=start scheme={}",
            uri.scheme()
        );
        match uri {
            ArchiveUri::Plain { .. } => provider.open(uri),
            ArchiveUri::Nested { outer, entry, .. } => {
                let archive = self.open(outer)?;
                provider.open_entry(archive, entry)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ArchiveProviders, ArchiveUri, JAR_SCHEME};
    use std::io::{ErrorKind, Read, Write};
    use std::path::Path;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = std::fs::File::create(path).expect("create archive");
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, contents) in entries {
            writer.start_file(*name, options).expect("start entry");
            writer.write_all(contents.as_bytes()).expect("write entry");
        }
        writer.finish().expect("finish archive");
    }

    #[test]
    fn parses_plain_and_nested_uris() {
        let plain = ArchiveUri::parse("file:///tmp/a.bundle").expect("plain uri");
        assert_eq!(plain.scheme(), "file");
        assert_eq!(plain.to_string(), "file:///tmp/a.bundle");

        let nested =
            ArchiveUri::parse("jar:file:///tmp/a.bundle!/META-INF/x.txt").expect("nested uri");
        match &nested {
            ArchiveUri::Nested { outer, entry, .. } => {
                assert_eq!(outer.scheme(), "file");
                assert_eq!(entry, "META-INF/x.txt");
            }
            other => panic!("expected nested uri, got {other:?}"),
        }
        assert_eq!(nested.to_string(), "jar:file:///tmp/a.bundle!/META-INF/x.txt");

        let hdfs = ArchiveUri::parse("hdfs://namenode:8020/lib/a.bundle").expect("hdfs uri");
        assert_eq!(hdfs.scheme(), "hdfs");

        assert!(ArchiveUri::parse("no-scheme").is_err());
        assert!(ArchiveUri::parse("jar:file:///a.bundle!/").is_err());
    }

    #[test]
    fn maps_custom_extensions_to_archive_scheme() {
        let providers = ArchiveProviders::with_defaults(&["bundle", " ", "nar"]);
        assert_eq!(providers.scheme_for_path("/lib/a.bundle"), Some(JAR_SCHEME));
        assert_eq!(providers.scheme_for_path("/lib/a.NAR"), Some(JAR_SCHEME));
        assert_eq!(providers.scheme_for_path("/lib/a.jar"), Some(JAR_SCHEME));
        assert_eq!(providers.scheme_for_path("/lib/a.txt"), None);
        assert!(providers.has_provider("file"));
        assert!(providers.has_provider(JAR_SCHEME));
        assert!(!providers.has_provider("hdfs"));
    }

    #[test]
    fn opens_entries_inside_zip_archives() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("parsers.nar");
        write_zip(
            &path,
            &[("META-INF/bundle.txt", "acme:parsers:1.0"), ("data/a.txt", "alpha")],
        );

        let providers = ArchiveProviders::with_defaults(&["nar"]);
        let uri = providers
            .entry_uri(&path, "data/a.txt")
            .expect("nar maps to the archive scheme");
        assert_eq!(uri.scheme(), JAR_SCHEME);

        let mut text = String::new();
        providers
            .open(&uri)
            .expect("open entry")
            .read_to_string(&mut text)
            .expect("read");
        assert_eq!(text, "alpha");

        let reparsed = ArchiveUri::parse(&uri.to_string()).expect("round trips as text");
        assert_eq!(reparsed, uri);

        let missing = providers
            .entry_uri(&path, "data/missing.txt")
            .expect("uri");
        let err = providers.open(&missing).err().expect("entry is absent");
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let not_zip = dir.path().join("broken.nar");
        std::fs::write(&not_zip, "plain text, no central directory\n".repeat(4))
            .expect("write");
        let err = providers
            .open(&providers.entry_uri(&not_zip, "x").expect("uri"))
            .err()
            .expect("not an archive");
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn opens_local_files_and_rejects_unknown_schemes() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"payload").expect("write");

        let providers = ArchiveProviders::with_defaults::<&str>(&[]);
        let mut text = String::new();
        providers
            .open(&ArchiveUri::for_path(file.path()))
            .expect("open local file")
            .read_to_string(&mut text)
            .expect("read");
        assert_eq!(text, "payload");

        let err = providers
            .open(&ArchiveUri::parse("hdfs://nn/x").expect("uri"))
            .err()
            .expect("hdfs is not registered");
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }
}
