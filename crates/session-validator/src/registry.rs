//! Plugin registries of the host wallet.
//!
//! The wallet keeps its enabled validators, hooks and modules in
//! sentinel-linked address lists. The session-key engine only consults the
//! validator partition (a permit must be vouched for by a *sudo*-class
//! validator), but the bookkeeping surface is the same for all three kinds.

use std::collections::HashMap;

use alloy_primitives::Address;

/// The sentinel heading every list; never a valid data entry.
pub const SENTINEL: Address = Address::with_last_byte(1);

/// Errors of the linked-list registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The entry is the zero address or the sentinel.
    #[error("invalid registry entry")]
    InvalidEntry,
    /// The entry is already present.
    #[error("entry already exists")]
    AlreadyExists,
    /// The entry is not present.
    #[error("entry not found")]
    NotFound,
    /// The supplied predecessor does not point at the entry.
    #[error("wrong predecessor for removal")]
    InvalidPredecessor,
}

/// A sentinel-based singly linked set of addresses.
///
/// New entries are inserted at the head; removal requires the caller to
/// supply the correct predecessor, mirroring a singly linked list without
/// back-pointers.
#[derive(Debug, Clone, Default)]
pub struct AddressList {
    next: HashMap<Address, Address>,
    len: usize,
}

impl AddressList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    fn is_valid_entry(entry: Address) -> bool {
        entry != Address::ZERO && entry != SENTINEL
    }

    /// Inserts `entry` at the head of the list.
    pub fn add(&mut self, entry: Address) -> Result<(), RegistryError> {
        if !Self::is_valid_entry(entry) {
            return Err(RegistryError::InvalidEntry);
        }
        if self.contains(entry) {
            return Err(RegistryError::AlreadyExists);
        }
        let head = self.next.get(&SENTINEL).copied().unwrap_or(SENTINEL);
        self.next.insert(entry, head);
        self.next.insert(SENTINEL, entry);
        self.len += 1;
        Ok(())
    }

    /// Removes `entry`, given its predecessor in the list.
    pub fn remove(&mut self, prev: Address, entry: Address) -> Result<(), RegistryError> {
        if !Self::is_valid_entry(entry) {
            return Err(RegistryError::InvalidEntry);
        }
        if !self.contains(entry) {
            return Err(RegistryError::NotFound);
        }
        if self.next.get(&prev).copied() != Some(entry) {
            return Err(RegistryError::InvalidPredecessor);
        }
        let after = self.next.remove(&entry).expect("entry is present");
        self.next.insert(prev, after);
        self.len -= 1;
        Ok(())
    }

    /// Whether `entry` is in the list.
    pub fn contains(&self, entry: Address) -> bool {
        Self::is_valid_entry(entry) && self.next.contains_key(&entry)
    }

    /// Entries in list order (most recently added first).
    pub fn list(&self) -> Vec<Address> {
        let mut out = Vec::with_capacity(self.len);
        let mut cursor = self.next.get(&SENTINEL).copied().unwrap_or(SENTINEL);
        while cursor != SENTINEL {
            out.push(cursor);
            cursor = self.next.get(&cursor).copied().unwrap_or(SENTINEL);
        }
        out
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Class of a registered validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorClass {
    /// Full-authority validators; the only class that may vouch for owner
    /// permits.
    Sudo,
    /// Scoped validators such as this session-key engine.
    Normal,
}

/// The wallet's plugin bookkeeping: validators partitioned by class, plus
/// hooks and modules.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    sudo_validators: AddressList,
    normal_validators: AddressList,
    hooks: AddressList,
    modules: AddressList,
}

impl ModuleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables a validator of the given class.
    pub fn add_validator(
        &mut self,
        validator: Address,
        class: ValidatorClass,
    ) -> Result<(), RegistryError> {
        match class {
            ValidatorClass::Sudo => self.sudo_validators.add(validator),
            ValidatorClass::Normal => self.normal_validators.add(validator),
        }
    }

    /// Disables a validator, given its predecessor in the class list.
    pub fn remove_validator(
        &mut self,
        prev: Address,
        validator: Address,
        class: ValidatorClass,
    ) -> Result<(), RegistryError> {
        match class {
            ValidatorClass::Sudo => self.sudo_validators.remove(prev, validator),
            ValidatorClass::Normal => self.normal_validators.remove(prev, validator),
        }
    }

    /// Whether `validator` is enabled with sudo authority.
    pub fn is_sudo(&self, validator: Address) -> bool {
        self.sudo_validators.contains(validator)
    }

    /// Whether `validator` is enabled in either class.
    pub fn is_validator_enabled(&self, validator: Address) -> bool {
        self.sudo_validators.contains(validator) || self.normal_validators.contains(validator)
    }

    /// Enabled sudo validators, most recently added first.
    pub fn sudo_validators(&self) -> Vec<Address> {
        self.sudo_validators.list()
    }

    /// Enables a hook.
    pub fn add_hook(&mut self, hook: Address) -> Result<(), RegistryError> {
        self.hooks.add(hook)
    }

    /// Whether a hook is enabled.
    pub fn is_hook_enabled(&self, hook: Address) -> bool {
        self.hooks.contains(hook)
    }

    /// Enables a module.
    pub fn add_module(&mut self, module: Address) -> Result<(), RegistryError> {
        self.modules.add(module)
    }

    /// Whether a module is enabled.
    pub fn is_module_enabled(&self, module: Address) -> bool {
        self.modules.contains(module)
    }
}
