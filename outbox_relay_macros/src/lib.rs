mod domain_event;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(DomainEvent)]
// ============================================================================

/// Derive macro that implements `outbox_relay::DomainEvent` for a struct.
///
/// The struct must also derive `serde::Serialize` and `serde::Deserialize`,
/// and carry an identifier field and a creation timestamp field.
///
/// # Usage
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, DomainEvent)]
/// #[event(name = "AccountCreated")]
/// pub struct AccountCreated {
///     pub event_id: Uuid,
///     pub occurred_at: DateTime<Utc>,
///     pub account_id: Uuid,
///     #[event(enumeration)]
///     pub role: Role,
///     pub display_name: Option<String>,
/// }
/// ```
///
/// Struct attributes:
/// - `#[event(name = "...")]` - stable type name stored in the outbox (defaults to the struct name)
///
/// Field attributes:
/// - `#[event(id)]` - the event identifier (defaults to a field named `event_id`)
/// - `#[event(occurred_at)]` - the creation timestamp (defaults to a field named `occurred_at`)
/// - `#[event(enumeration)]` - enum-typed field, rebuilt from its stored primitive
/// - `#[event(identifier)]` / `#[event(timestamp)]` - force a coercion kind
///
/// Field kinds are otherwise inferred from the declared type: `Uuid` is an
/// identifier, `DateTime<_>` is a timestamp, `Option<T>` wraps the kind of `T`,
/// and everything else passes through untouched. `#[serde(skip)]` fields are
/// left out of the schema. Field `#[serde(rename = "...")]` and container
/// `#[serde(rename_all = "...")]` are honoured.
#[proc_macro_derive(DomainEvent, attributes(event))]
pub fn derive_domain_event(input: TokenStream) -> TokenStream {
    domain_event::derive_domain_event(input)
}
