use std::collections::{BTreeMap, BTreeSet};

/// Who may trigger a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    /// Configured owner or the bot's own account
    Owner,
    /// Owner, own account, or anyone on the privileged-user list
    Privileged,
    /// Everyone
    Public,
}

/// Metadata describing a declared command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMetadata {
    pub name: String,
    pub description: String,
    pub category: String,
    /// Filled in by the lifecycle manager when the command is registered
    pub module_id: String,
    pub aliases: BTreeSet<String>,
    pub usage: String,
    pub owner_only: bool,
    pub is_public: bool,
}

impl CommandMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            description: String::new(),
            category: "General".to_string(),
            module_id: String::new(),
            aliases: BTreeSet::new(),
            usage: String::new(),
            owner_only: false,
            is_public: false,
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(|a| a.into().to_lowercase()).collect();
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    pub fn owner_only(mut self) -> Self {
        self.owner_only = true;
        self
    }

    pub fn public(mut self) -> Self {
        self.is_public = true;
        self
    }

    /// `owner_only` wins over `is_public`
    pub fn access_level(&self) -> AccessLevel {
        if self.owner_only {
            AccessLevel::Owner
        } else if self.is_public {
            AccessLevel::Public
        } else {
            AccessLevel::Privileged
        }
    }

    /// Name followed by aliases
    pub fn names(&self) -> Vec<String> {
        std::iter::once(self.name.clone())
            .chain(self.aliases.iter().cloned())
            .collect()
    }

    pub fn matches(&self, input: &str) -> bool {
        let input_lower = input.to_lowercase();
        self.name == input_lower || self.aliases.contains(&input_lower)
    }
}

/// Index of command metadata, at most one entry per name
#[derive(Debug, Default)]
pub struct CommandIndex {
    commands: BTreeMap<String, CommandMetadata>,
}

impl CommandIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning the one it replaced
    pub fn upsert(&mut self, entry: CommandMetadata) -> Option<CommandMetadata> {
        self.commands.insert(entry.name.clone(), entry)
    }

    /// Remove every entry owned by `module_id`, returning how many were dropped
    pub fn remove_module(&mut self, module_id: &str) -> usize {
        let before = self.commands.len();
        self.commands.retain(|_, cmd| cmd.module_id != module_id);
        before - self.commands.len()
    }

    pub fn get(&self, name: &str) -> Option<&CommandMetadata> {
        self.commands.get(&name.to_lowercase())
    }

    pub fn find(&self, input: &str) -> Option<&CommandMetadata> {
        self.get(input)
            .or_else(|| self.commands.values().find(|c| c.matches(input)))
    }

    pub fn all(&self) -> impl Iterator<Item = &CommandMetadata> {
        self.commands.values()
    }

    /// Entries grouped by category, both sorted
    pub fn by_category(&self) -> BTreeMap<String, Vec<CommandMetadata>> {
        let mut grouped: BTreeMap<String, Vec<CommandMetadata>> = BTreeMap::new();
        for cmd in self.commands.values() {
            grouped.entry(cmd.category.clone()).or_default().push(cmd.clone());
        }
        grouped
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
