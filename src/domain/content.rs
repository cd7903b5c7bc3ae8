/// Post type of a saved resource, as the host registered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostType {
    pub name: String,
    pub public: bool,
    pub publicly_queryable: bool,
}

impl PostType {
    /// Whether the type has a single-item view a visitor can reach.
    pub fn has_public_view(&self) -> bool {
        self.public && self.publicly_queryable
    }
}

/// A resource was saved in the host CMS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSaved {
    pub post_id: u64,
    pub post_type: PostType,
    pub urls: Vec<String>,
    pub form_submission: bool,
}
