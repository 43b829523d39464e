use opentelemetry::InstrumentationScope;

/// Cache key for a tracer: one tracer exists per distinct identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TracerIdentity {
    pub name: String,
    pub version: Option<String>,
    pub schema_url: Option<String>,
}

impl TracerIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            schema_url: None,
        }
    }

    /// Identity of the scope used for spans reconstructed from `package`.
    pub fn for_package(prefix: &str, package: &str, version: &str) -> Self {
        Self::new(format!("{prefix}{package}")).with_version(version)
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into()).filter(|v: &String| !v.is_empty());
        self
    }

    pub fn with_schema_url(mut self, schema_url: impl Into<String>) -> Self {
        self.schema_url = Some(schema_url.into()).filter(|s: &String| !s.is_empty());
        self
    }

    pub fn to_scope(&self) -> InstrumentationScope {
        let mut builder = InstrumentationScope::builder(self.name.clone());
        if let Some(version) = &self.version {
            builder = builder.with_version(version.clone());
        }
        if let Some(schema_url) = &self.schema_url {
            builder = builder.with_schema_url(schema_url.clone());
        }
        builder.build()
    }
}
