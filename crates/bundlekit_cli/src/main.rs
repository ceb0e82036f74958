//! CLI smoke entry point.
//!
//! # Responsibility
//! - Wire a host namespace, one demo bundle and a registry end to end.
//! - Instantiate the bundled extension, optionally configured from a
//!   properties file given as the first argument.

use bundlekit_core::context::ambient;
use bundlekit_core::{
    BundleBuilder, BundleCoordinate, BundleProperties, ClassBuilder, ExtensionRegistry,
    Instantiator, IsolatedNamespace, NamespaceContents, NamespaceRef,
};
use std::error::Error;
use std::sync::Arc;

const GREETER_API: &str = "bundlekit.demo.Greeter";
const GREETER_IMPL: &str = "bundlekit.demo.hello.HelloGreeter";

trait Greeter: Send {
    fn greet(&self) -> String;
}

struct HelloGreeter {
    salutation: String,
}

impl Greeter for HelloGreeter {
    fn greet(&self) -> String {
        let context = ambient::current()
            .map(|namespace| namespace.label())
            .unwrap_or_else(|| "none".to_string());
        format!("{} (ambient={context})", self.salutation)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    println!("bundlekit_core version={}", bundlekit_core::core_version());

    let config = match std::env::args().nth(1) {
        Some(path) => Some(BundleProperties::from_path(path)?),
        None => None,
    };

    let host: NamespaceRef = Arc::new(IsolatedNamespace::host(NamespaceContents::new()));
    let bundle = BundleBuilder::new(BundleCoordinate::new(Some("bundlekit"), "demo", None)?)
        .parent(NamespaceRef::clone(&host))
        .class(
            ClassBuilder::new(GREETER_IMPL)
                .implements(GREETER_API)
                .constructor::<dyn Greeter, _>(|| {
                    Ok(Box::new(HelloGreeter {
                        salutation: "hello".to_string(),
                    }))
                })
                .config_constructor::<dyn Greeter, _>(|config: &BundleProperties| {
                    Ok(Box::new(HelloGreeter {
                        salutation: config.get_or("greeting", "hello").to_string(),
                    }))
                }),
        )
        .build()?;

    let registry = ExtensionRegistry::new(host, [GREETER_API])?;
    registry.register_bundle(bundle)?;
    registry.initialize();

    let instantiator = Instantiator::new(Arc::new(registry));
    let greeter = instantiator.create_instance::<dyn Greeter>(GREETER_IMPL, config.as_ref())?;
    println!("{}", greeter.greet());
    Ok(())
}
