//! Contact resolution and creation.
//!
//! Every record links to identity entities at the remote system. The
//! resolver guarantees each email address resolves to exactly one
//! remote contact: cache first, then remote lookup, and only then a
//! creation call. The cache is shared across concurrent sessions, and
//! the shard lock is held across the remote round-trip, so creation is
//! idempotent even when two sessions race on the same address.

use crate::remote::{RemoteError, RemoteId, RemoteWriter};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Local parts that identify automated senders rather than people.
const SERVICE_LOCAL_PARTS: &[&str] = &[
    "service", "noreply", "no-reply", "notify", "support", "admin", "info", "newsletter",
];

/// Errors from structural email validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The address is empty or whitespace.
    #[error("address is empty")]
    Empty,

    /// The address has no `@` separator.
    #[error("address is missing '@'")]
    MissingAtSign,

    /// The address has more than one `@`.
    #[error("address has more than one '@'")]
    MultipleAtSigns,

    /// The local part is malformed.
    #[error("invalid local part in {0}")]
    InvalidLocalPart(String),

    /// The domain is malformed.
    #[error("invalid domain in {0}")]
    InvalidDomain(String),
}

/// A structurally validated, lowercased email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Parses and validates an address.
    ///
    /// Validation is structural only: one `@`, a plausible local part,
    /// and a dotted domain. Deliverability is the remote's problem.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }

        match trimmed.matches('@').count() {
            0 => return Err(AddressError::MissingAtSign),
            1 => {}
            _ => return Err(AddressError::MultipleAtSigns),
        }

        let (local, domain) = trimmed.split_once('@').ok_or(AddressError::MissingAtSign)?;

        if local.is_empty()
            || local.starts_with('.')
            || local.ends_with('.')
            || !local
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '%' | '+' | '-'))
        {
            return Err(AddressError::InvalidLocalPart(trimmed.to_string()));
        }

        if !domain.contains('.') {
            return Err(AddressError::InvalidDomain(trimmed.to_string()));
        }
        let labels: Vec<&str> = domain.split('.').collect();
        let labels_ok = labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
        let tld_ok = labels
            .last()
            .map(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
            .unwrap_or(false);
        if !labels_ok || !tld_ok {
            return Err(AddressError::InvalidDomain(trimmed.to_string()));
        }

        Ok(Self(trimmed.to_lowercase()))
    }

    /// Returns the full address.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the part before the `@`.
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or("")
    }

    /// Returns the part after the `@`.
    pub fn domain(&self) -> &str {
        self.0.split('@').nth(1).unwrap_or("")
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EmailAddress> for String {
    fn from(address: EmailAddress) -> Self {
        address.0
    }
}

/// A resolved reference to an identity entity at the remote system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRef {
    /// Email address, the resolution key.
    pub email: EmailAddress,
    /// Display name shown at the remote.
    pub display_name: String,
    /// Organization label.
    pub company: String,
    /// Remote identifier, assigned at most once per email.
    pub remote_id: RemoteId,
}

/// Fields sent to the remote when creating a contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactFields {
    /// Email address.
    pub email: EmailAddress,
    /// Derived display name.
    pub display_name: String,
    /// Derived first name, possibly empty.
    pub first_name: String,
    /// Derived last name, possibly empty.
    pub last_name: String,
    /// Derived organization label.
    pub company: String,
}

/// Domain to organization-label mappings.
///
/// Unknown domains fall back to a titleized domain token.
#[derive(Debug, Clone, Default)]
pub struct CompanyTable {
    overrides: HashMap<String, String>,
}

impl CompanyTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a domain to organization mapping.
    #[must_use]
    pub fn with_mapping(mut self, domain: impl Into<String>, label: impl Into<String>) -> Self {
        self.overrides.insert(domain.into().to_lowercase(), label.into());
        self
    }

    /// Resolves a domain to an organization label.
    pub fn resolve(&self, domain: &str) -> String {
        if let Some(label) = self.overrides.get(&domain.to_lowercase()) {
            return label.clone();
        }
        let token = domain.split('.').next().unwrap_or(domain);
        titleize(token)
    }
}

/// Configuration for contact resolution.
#[derive(Debug, Clone)]
pub struct ContactConfig {
    /// Maximum creations per batch cycle.
    pub creation_batch_limit: usize,
    /// Domain to organization mappings.
    pub companies: CompanyTable,
}

impl ContactConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the creation batch limit.
    #[must_use]
    pub fn with_creation_batch_limit(mut self, limit: usize) -> Self {
        self.creation_batch_limit = limit.max(1);
        self
    }

    /// Sets the company table.
    #[must_use]
    pub fn with_companies(mut self, companies: CompanyTable) -> Self {
        self.companies = companies;
        self
    }
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            creation_batch_limit: 25,
            companies: CompanyTable::new(),
        }
    }
}

/// Derives remote contact fields from an address and an optional
/// display-name hint.
pub fn derive_contact_fields(
    email: &EmailAddress,
    hint: Option<&str>,
    companies: &CompanyTable,
) -> ContactFields {
    let display_name = derive_display_name(email, hint, companies);
    let (first_name, last_name) = split_display_name(&display_name);
    ContactFields {
        email: email.clone(),
        display_name,
        first_name,
        last_name,
        company: companies.resolve(email.domain()),
    }
}

/// Derives a display name.
///
/// A well-formed hint wins; service-style local parts pair with an
/// organization label instead of a fabricated human name; everything
/// else is split on separators and titlecased.
pub fn derive_display_name(
    email: &EmailAddress,
    hint: Option<&str>,
    companies: &CompanyTable,
) -> String {
    if let Some(hint) = hint {
        let hint = hint.trim();
        if !hint.is_empty()
            && !hint.eq_ignore_ascii_case(email.as_str())
            && hint.chars().any(|c| c.is_alphabetic())
        {
            return hint.to_string();
        }
    }

    let local = email.local_part();
    if SERVICE_LOCAL_PARTS.iter().any(|p| local.contains(p)) {
        return format!("{} Service", companies.resolve(email.domain()));
    }

    let parts: Vec<&str> = local
        .split(['.', '_', '-'])
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        return titleize(local);
    }
    parts
        .iter()
        .map(|part| titleize(part))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits a display name into first and last name.
pub fn split_display_name(display_name: &str) -> (String, String) {
    let mut parts = display_name.split_whitespace();
    let first = parts.next().unwrap_or("").to_string();
    let rest: Vec<&str> = parts.collect();
    (first, rest.join(" "))
}

fn titleize(token: &str) -> String {
    token
        .split(['-', '_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Contact resolution counters.
#[derive(Debug, Default)]
pub struct ContactStats {
    analyzed: AtomicU64,
    created: AtomicU64,
    reused: AtomicU64,
    failed: AtomicU64,
    invalid: AtomicU64,
}

impl ContactStats {
    /// Records an address submitted for resolution.
    pub fn record_analyzed(&self) {
        self.analyzed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a remote creation.
    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a cache or remote-lookup hit.
    pub fn record_reused(&self) {
        self.reused.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed creation.
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a structurally invalid address.
    pub fn record_invalid(&self) {
        self.invalid.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot.
    pub fn snapshot(&self) -> ContactStatsSnapshot {
        ContactStatsSnapshot {
            analyzed: self.analyzed.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of contact statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactStatsSnapshot {
    /// Addresses submitted for resolution.
    pub analyzed: u64,
    /// Contacts created at the remote.
    pub created: u64,
    /// Resolutions served from cache or remote lookup.
    pub reused: u64,
    /// Failed creations.
    pub failed: u64,
    /// Structurally invalid addresses.
    pub invalid: u64,
}

/// Sharded contact cache shared between concurrent sessions.
#[derive(Debug)]
pub struct ContactCache {
    shards: Vec<Mutex<HashMap<String, ContactRef>>>,
}

impl ContactCache {
    /// Creates a cache with the default shard count.
    pub fn new() -> Self {
        Self::with_shards(16)
    }

    /// Creates a cache with a specific shard count.
    pub fn with_shards(shards: usize) -> Self {
        let shards = shards.max(1);
        let mut vec = Vec::with_capacity(shards);
        for _ in 0..shards {
            vec.push(Mutex::new(HashMap::new()));
        }
        Self { shards: vec }
    }

    /// Looks up a cached contact.
    pub fn get(&self, email: &EmailAddress) -> Option<ContactRef> {
        self.shard_for(email.as_str()).lock().get(email.as_str()).cloned()
    }

    /// Number of cached contacts.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shard_for(&self, key: &str) -> &Mutex<HashMap<String, ContactRef>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }
}

impl Default for ContactCache {
    fn default() -> Self {
        Self::new()
    }
}

/// One address to resolve, with an optional display-name hint.
#[derive(Debug, Clone)]
pub struct ContactRequest {
    /// The address to resolve.
    pub email: EmailAddress,
    /// Optional display-name hint from the source data.
    pub hint: Option<String>,
}

impl ContactRequest {
    /// Creates a request without a hint.
    pub fn new(email: EmailAddress) -> Self {
        Self { email, hint: None }
    }
}

/// Outcome of a batched resolution pass.
#[derive(Debug, Default)]
pub struct ContactBatch {
    /// Successfully resolved contacts, in request order.
    pub resolved: Vec<ContactRef>,
    /// Addresses whose creation failed, with the final error.
    pub failures: Vec<(EmailAddress, RemoteError)>,
}

impl ContactBatch {
    /// Returns true if any failure is permanent.
    pub fn has_permanent_failure(&self) -> bool {
        self.failures.iter().any(|(_, error)| !error.is_transient())
    }
}

/// Partition of addresses into existing and missing contacts.
#[derive(Debug, Default)]
pub struct MissingAnalysis {
    /// Addresses that already resolve to a remote contact.
    pub existing: Vec<ContactRef>,
    /// Addresses with no remote contact yet.
    pub missing: Vec<EmailAddress>,
}

/// Resolves addresses to remote contacts, creating them when missing.
pub struct ContactResolver<W> {
    writer: Arc<W>,
    cache: Arc<ContactCache>,
    config: ContactConfig,
    stats: ContactStats,
}

impl<W: RemoteWriter> ContactResolver<W> {
    /// Creates a resolver over a shared cache.
    pub fn new(writer: Arc<W>, cache: Arc<ContactCache>, config: ContactConfig) -> Self {
        Self {
            writer,
            cache,
            config,
            stats: ContactStats::default(),
        }
    }

    /// Returns the shared cache.
    pub fn cache(&self) -> &Arc<ContactCache> {
        &self.cache
    }

    /// Returns the resolution counters.
    pub fn stats(&self) -> ContactStatsSnapshot {
        self.stats.snapshot()
    }

    /// Records a structurally invalid address encountered by the caller.
    pub fn record_invalid(&self) {
        self.stats.record_invalid();
    }

    /// Resolves one address, creating the contact if it is missing.
    ///
    /// The shard lock is held across the remote round-trip, so two
    /// racing resolutions of the same address produce exactly one
    /// creation call.
    pub fn resolve_or_create(
        &self,
        email: &EmailAddress,
        hint: Option<&str>,
    ) -> Result<ContactRef, RemoteError> {
        self.stats.record_analyzed();

        let shard = self.cache.shard_for(email.as_str());
        let mut guard = shard.lock();

        if let Some(cached) = guard.get(email.as_str()) {
            self.stats.record_reused();
            return Ok(cached.clone());
        }

        if let Some(existing) = self.writer.find_contact(email)? {
            self.stats.record_reused();
            guard.insert(email.as_str().to_string(), existing.clone());
            return Ok(existing);
        }

        let fields = derive_contact_fields(email, hint, &self.config.companies);
        match self.writer.create_contact(&fields) {
            Ok(created) => {
                self.stats.record_created();
                tracing::info!(
                    email = %email,
                    display_name = %created.display_name,
                    remote_id = %created.remote_id,
                    "created contact",
                );
                guard.insert(email.as_str().to_string(), created.clone());
                Ok(created)
            }
            Err(error) => {
                self.stats.record_failed();
                Err(error)
            }
        }
    }

    /// Resolves a batch of addresses in chunks bounded by the creation
    /// batch limit.
    ///
    /// A failed creation never aborts its siblings; failures are
    /// collected for the caller's retry policy.
    pub fn ensure_contacts(&self, requests: &[ContactRequest]) -> ContactBatch {
        let mut batch = ContactBatch::default();
        for chunk in requests.chunks(self.config.creation_batch_limit.max(1)) {
            for request in chunk {
                match self.resolve_or_create(&request.email, request.hint.as_deref()) {
                    Ok(contact) => batch.resolved.push(contact),
                    Err(error) => {
                        tracing::warn!(
                            email = %request.email,
                            error = %error,
                            "contact resolution failed",
                        );
                        batch.failures.push((request.email.clone(), error));
                    }
                }
            }
        }
        batch
    }

    /// Partitions addresses into existing and missing, without creating
    /// anything.
    pub fn analyze_missing(
        &self,
        addresses: &[EmailAddress],
    ) -> Result<MissingAnalysis, RemoteError> {
        let mut analysis = MissingAnalysis::default();
        for email in addresses {
            if let Some(cached) = self.cache.get(email) {
                analysis.existing.push(cached);
                continue;
            }
            match self.writer.find_contact(email)? {
                Some(existing) => analysis.existing.push(existing),
                None => analysis.missing.push(email.clone()),
            }
        }
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;

    fn email(s: &str) -> EmailAddress {
        EmailAddress::parse(s).unwrap()
    }

    fn resolver(remote: Arc<MemoryRemote>) -> ContactResolver<MemoryRemote> {
        ContactResolver::new(remote, Arc::new(ContactCache::new()), ContactConfig::default())
    }

    #[test]
    fn parse_accepts_plausible_addresses() {
        assert!(EmailAddress::parse("alice@example.com").is_ok());
        assert!(EmailAddress::parse("first.last+tag@sub.example.co").is_ok());
        assert_eq!(
            EmailAddress::parse(" Alice@Example.COM ").unwrap().as_str(),
            "alice@example.com"
        );
    }

    #[test]
    fn parse_rejects_malformed_addresses() {
        assert_eq!(EmailAddress::parse("  "), Err(AddressError::Empty));
        assert_eq!(
            EmailAddress::parse("no-at-sign"),
            Err(AddressError::MissingAtSign)
        );
        assert_eq!(
            EmailAddress::parse("a@b@c.com"),
            Err(AddressError::MultipleAtSigns)
        );
        assert!(matches!(
            EmailAddress::parse(".dot@example.com"),
            Err(AddressError::InvalidLocalPart(_))
        ));
        assert!(matches!(
            EmailAddress::parse("alice@nodot"),
            Err(AddressError::InvalidDomain(_))
        ));
        assert!(matches!(
            EmailAddress::parse("alice@example.c0m"),
            Err(AddressError::InvalidDomain(_))
        ));
    }

    #[test]
    fn local_part_and_domain() {
        let address = email("first.last@corp.example.com");
        assert_eq!(address.local_part(), "first.last");
        assert_eq!(address.domain(), "corp.example.com");
    }

    #[test]
    fn display_name_from_separators() {
        let companies = CompanyTable::new();
        assert_eq!(
            derive_display_name(&email("jane.doe@example.com"), None, &companies),
            "Jane Doe"
        );
        assert_eq!(
            derive_display_name(&email("john_q_public@example.com"), None, &companies),
            "John Q Public"
        );
        assert_eq!(
            derive_display_name(&email("mononym@example.com"), None, &companies),
            "Mononym"
        );
    }

    #[test]
    fn service_addresses_get_organization_labels() {
        let companies = CompanyTable::new().with_mapping("northwind.com", "Northwind Traders");
        assert_eq!(
            derive_display_name(&email("no-reply@northwind.com"), None, &companies),
            "Northwind Traders Service"
        );
        assert_eq!(
            derive_display_name(&email("support@acme-widgets.com"), None, &companies),
            "Acme Widgets Service"
        );
    }

    #[test]
    fn well_formed_hint_wins() {
        let companies = CompanyTable::new();
        assert_eq!(
            derive_display_name(
                &email("jdoe@example.com"),
                Some("Jane Doe"),
                &companies
            ),
            "Jane Doe"
        );
        // A hint that is just the address again is not a name.
        assert_eq!(
            derive_display_name(
                &email("jdoe@example.com"),
                Some("jdoe@example.com"),
                &companies
            ),
            "Jdoe"
        );
    }

    #[test]
    fn company_resolution() {
        let companies = CompanyTable::new().with_mapping("example.com", "Example Corp");
        assert_eq!(companies.resolve("example.com"), "Example Corp");
        assert_eq!(companies.resolve("acme-widgets.io"), "Acme Widgets");
    }

    #[test]
    fn contact_fields_split_names() {
        let fields = derive_contact_fields(
            &email("jane.van.dyke@example.com"),
            None,
            &CompanyTable::new(),
        );
        assert_eq!(fields.display_name, "Jane Van Dyke");
        assert_eq!(fields.first_name, "Jane");
        assert_eq!(fields.last_name, "Van Dyke");
        assert_eq!(fields.company, "Example");
    }

    #[test]
    fn resolve_creates_exactly_once() {
        let remote = Arc::new(MemoryRemote::new());
        let resolver = resolver(Arc::clone(&remote));
        let address = email("jane.doe@example.com");

        let first = resolver.resolve_or_create(&address, None).unwrap();
        let second = resolver.resolve_or_create(&address, None).unwrap();

        assert_eq!(first, second);
        assert_eq!(remote.create_contact_calls(), 1);
        // Second call was a cache hit, no further lookup.
        assert_eq!(remote.find_contact_calls(), 1);
        assert_eq!(resolver.stats().created, 1);
        assert_eq!(resolver.stats().reused, 1);
    }

    #[test]
    fn shared_cache_spans_resolvers() {
        // Two resolvers sharing one cache model two sessions.
        let remote = Arc::new(MemoryRemote::new());
        let cache = Arc::new(ContactCache::new());
        let first_session = ContactResolver::new(
            Arc::clone(&remote),
            Arc::clone(&cache),
            ContactConfig::default(),
        );
        let second_session =
            ContactResolver::new(Arc::clone(&remote), cache, ContactConfig::default());

        let address = email("shared@example.com");
        let first = first_session.resolve_or_create(&address, None).unwrap();
        let second = second_session.resolve_or_create(&address, None).unwrap();

        assert_eq!(first, second);
        assert_eq!(remote.create_contact_calls(), 1);
    }

    #[test]
    fn remote_hit_is_reused_not_recreated() {
        let remote = Arc::new(MemoryRemote::new());
        remote.seed_contact(ContactRef {
            email: email("known@example.com"),
            display_name: "Known Person".to_string(),
            company: "Example".to_string(),
            remote_id: RemoteId::new("con-seeded"),
        });

        let resolver = resolver(Arc::clone(&remote));
        let resolved = resolver
            .resolve_or_create(&email("known@example.com"), None)
            .unwrap();
        assert_eq!(resolved.remote_id, RemoteId::new("con-seeded"));
        assert_eq!(remote.create_contact_calls(), 0);
    }

    #[test]
    fn failed_creation_does_not_abort_siblings() {
        let remote = Arc::new(MemoryRemote::new());
        remote.fail_contact("bad@example.com", RemoteError::unavailable("outage"));

        let resolver = resolver(Arc::clone(&remote));
        let requests = vec![
            ContactRequest::new(email("good@example.com")),
            ContactRequest::new(email("bad@example.com")),
            ContactRequest::new(email("also-good@example.com")),
        ];

        let batch = resolver.ensure_contacts(&requests);
        assert_eq!(batch.resolved.len(), 2);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].0.as_str(), "bad@example.com");
        assert!(!batch.has_permanent_failure());
        assert_eq!(resolver.stats().failed, 1);
    }

    #[test]
    fn analyze_missing_partitions() {
        let remote = Arc::new(MemoryRemote::new());
        remote.seed_contact(ContactRef {
            email: email("known@example.com"),
            display_name: "Known".to_string(),
            company: "Example".to_string(),
            remote_id: RemoteId::new("con-1"),
        });

        let resolver = resolver(Arc::clone(&remote));
        let analysis = resolver
            .analyze_missing(&[email("known@example.com"), email("new@example.com")])
            .unwrap();

        assert_eq!(analysis.existing.len(), 1);
        assert_eq!(analysis.missing, vec![email("new@example.com")]);
        assert_eq!(remote.create_contact_calls(), 0);
    }

    #[test]
    fn concurrent_resolution_creates_once() {
        use std::thread;

        let remote = Arc::new(MemoryRemote::new());
        let resolver = Arc::new(resolver(Arc::clone(&remote)));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let resolver = Arc::clone(&resolver);
            handles.push(thread::spawn(move || {
                resolver
                    .resolve_or_create(&email("raced@example.com"), None)
                    .unwrap()
            }));
        }
        let results: Vec<ContactRef> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(remote.create_contact_calls(), 1);
    }
}
