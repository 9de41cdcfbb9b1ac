//! Common types used across the CNAE pipeline

/// One economic activity classification: a code and its description.
///
/// The code is always text. Codes such as `0111301` carry significant
/// leading zeros and must never pass through a numeric type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CnaeRecord {
    pub codigo_cnae: String,
    pub descricao_cnae: Option<String>,
}

impl CnaeRecord {
    pub fn new(codigo_cnae: impl Into<String>, descricao_cnae: impl Into<String>) -> Self {
        Self {
            codigo_cnae: codigo_cnae.into(),
            descricao_cnae: Some(descricao_cnae.into()),
        }
    }
}

/// Storage tier of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Raw bytes exactly as downloaded
    Bronze,
    /// Columnar file with a declared schema
    Silver,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Bronze => write!(f, "bronze"),
            Tier::Silver => write!(f, "silver"),
        }
    }
}

/// Location of an artifact in object storage
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactRef {
    pub tier: Tier,
    pub bucket: String,
    pub key: String,
}

impl ArtifactRef {
    pub fn new(tier: Tier, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            tier,
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}
