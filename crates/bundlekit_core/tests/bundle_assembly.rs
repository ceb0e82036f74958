use bundlekit_core::archive::{ArchiveProviders, ArchiveUri};
use bundlekit_core::{
    BundleBuilder, BundleCoordinate, BundleError, BundleProperties, ClassBuilder,
    ExtensionRegistry, IsolatedNamespace, ModuleRegistry, Namespace, NamespaceContents,
    NamespaceRef, PropertiesError,
};
use std::io::{Read, Write};
use std::sync::Arc;

fn host() -> NamespaceRef {
    Arc::new(IsolatedNamespace::host(NamespaceContents::new()))
}

#[test]
fn registry_reads_extension_types_from_properties_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("bundlekit.properties");
    std::fs::write(
        &path,
        "# declared extension points\n\
         bundle.extension.type.parser = acme.api.Parser\n\
         bundle.extension.type.writer: acme.api.Writer\n\
         ! archive types\n\
         bundle.archive.extension = bundle, nar\n",
    )
    .expect("write properties");

    let properties = BundleProperties::from_path(&path).expect("properties load");
    assert_eq!(properties.archive_extensions(), vec!["bundle", "nar"]);

    let registry = ExtensionRegistry::from_properties(host(), &properties).expect("registry");
    assert_eq!(registry.declared_extension_types().len(), 2);

    let bundle = BundleBuilder::new(
        BundleCoordinate::new(Some("acme"), "writers", None).expect("coordinate"),
    )
    .class(ClassBuilder::new("acme.w.JsonWriter").implements("acme.api.Writer"))
    .build()
    .expect("bundle builds");
    registry.register_bundle(bundle).expect("register");
    registry.initialize();

    let universe = registry.extension_types().expect("universe");
    assert!(universe.contains("acme.api.Writer"));
    assert!(!universe.contains("acme.api.Parser"));
}

#[test]
fn malformed_properties_report_the_line() {
    let err = BundleProperties::from_properties_str("a = 1\n= missing key\n")
        .expect_err("line two is malformed");
    assert!(matches!(err, PropertiesError::Syntax { line: 2 }));
}

#[test]
fn bundle_resources_can_come_from_archive_entries() {
    let dir = tempfile::tempdir().expect("temp dir");
    let archive = dir.path().join("schemas.bundle");
    let mut writer = zip::ZipWriter::new(std::fs::File::create(&archive).expect("create archive"));
    writer
        .start_file("schema/v1.txt", zip::write::SimpleFileOptions::default())
        .expect("start entry");
    writer.write_all(b"schema v1").expect("write entry");
    writer.finish().expect("finish archive");

    let providers = ArchiveProviders::with_defaults(&BundleProperties::new().archive_extensions());
    assert_eq!(providers.scheme_for_path(&archive), Some("jar"));
    let entry = providers
        .entry_uri(&archive, "schema/v1.txt")
        .expect("bundle extension maps to the archive scheme");

    let coordinate = BundleCoordinate::new(Some("acme"), "schemas", Some("2.0")).expect("coordinate");
    let bundle = BundleBuilder::new(coordinate)
        .resource_from_archive("schema.txt", &providers, &entry)
        .expect("archive entry read")
        .build()
        .expect("bundle builds");

    let mut text = String::new();
    bundle
        .namespace()
        .get_resource_as_stream("schema.txt")
        .expect("lookup")
        .expect("resource present")
        .read_to_string(&mut text)
        .expect("read");
    assert_eq!(text, "schema v1");

    let absent = providers
        .entry_uri(&archive, "schema/v2.txt")
        .expect("uri");
    let err = BundleBuilder::new(BundleCoordinate::unknown())
        .resource_from_archive("x", &providers, &absent)
        .err()
        .expect("entry is absent");
    assert!(matches!(
        err,
        BundleError::Archive { ref source, .. } if source.kind() == std::io::ErrorKind::NotFound
    ));

    let remote = ArchiveUri::parse("jar:hdfs://namenode/lib/x.bundle!/schema/v1.txt").expect("uri");
    let err = BundleBuilder::new(BundleCoordinate::unknown())
        .resource_from_archive("x", &providers, &remote)
        .err()
        .expect("no hdfs provider");
    assert!(matches!(
        err,
        BundleError::Archive { ref source, .. } if source.kind() == std::io::ErrorKind::Unsupported
    ));
}
