/// Location of a Tempo block within a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    /// The block ID (GUID)
    pub block_id: String,
    /// The tenant ID
    pub tenant_id: String,
}

impl BlockInfo {
    /// Create a new BlockInfo
    pub fn new(block_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            block_id: block_id.into(),
            tenant_id: tenant_id.into(),
        }
    }

    /// Path format: <tenant_id>/<block_id>/data.parquet
    pub fn data_parquet_path(&self) -> String {
        self.object_path("data.parquet")
    }

    pub fn meta_path(&self) -> String {
        self.object_path("meta.json")
    }

    pub fn compacted_meta_path(&self) -> String {
        self.object_path("meta.compacted.json")
    }

    fn object_path(&self, name: &str) -> String {
        format!("{}/{}/{}", self.tenant_id, self.block_id, name)
    }
}
