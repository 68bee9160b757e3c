//! Shared DNS resolver construction.

use std::sync::LazyLock;

use hickory_resolver::{
    TokioResolver,
    config::{ResolverConfig, ResolverOpts},
    name_server::TokioConnectionProvider,
};

/// Shared resolver used by every probe that needs name resolution.
///
/// On Unix/Windows this uses the host system configuration (e.g.
/// `/etc/resolv.conf`). If the system configuration cannot be loaded, it
/// falls back to Hickory's default upstream set.
pub(crate) static SHARED_RESOLVER: LazyLock<TokioResolver> = LazyLock::new(build_system_resolver);

fn build_system_resolver() -> TokioResolver {
    #[cfg(any(unix, target_os = "windows"))]
    {
        match TokioResolver::builder_tokio() {
            Ok(builder) => return builder.build(),
            Err(e) => {
                log::warn!(
                    "Failed to load system DNS configuration, falling back to defaults: {e}"
                );
            }
        }
    }

    let provider = TokioConnectionProvider::default();
    TokioResolver::builder_with_config(ResolverConfig::default(), provider)
        .with_options(ResolverOpts::default())
        .build()
}
