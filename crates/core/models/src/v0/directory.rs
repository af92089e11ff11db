auto_derived!(
    /// Directory entry
    ///
    /// Public record for a single user as returned by the directory service
    pub struct DirectoryEntry {
        /// Unique Id
        #[cfg_attr(feature = "serde", serde(rename = "_id"))]
        pub id: String,
        /// Username
        pub username: String,
        /// Display name
        #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
        pub display_name: Option<String>,
        /// Base64 encoded public identity key
        pub public_key: String,
        /// Alternate identities registered against this entry
        ///
        /// Only populated when the lookup asked for all variants
        #[cfg_attr(
            feature = "serde",
            serde(skip_serializing_if = "Vec::is_empty", default)
        )]
        pub variants: Vec<EntryVariant>,
        /// Whether this entry has been suspended by moderation
        #[cfg_attr(feature = "serde", serde(skip_serializing_if = "crate::if_false", default))]
        pub suspended: bool,
    }

    /// Alternate identity attached to a directory entry
    pub struct EntryVariant {
        /// Unique Id of this variant
        pub id: String,
        /// Human readable label, if one was registered
        #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
        pub label: Option<String>,
        /// Base64 encoded public key for this variant
        pub public_key: String,
    }
);

impl DirectoryEntry {
    /// Name to show for this entry, preferring the display name
    pub fn visible_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}
