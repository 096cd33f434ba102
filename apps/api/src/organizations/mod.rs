// Organizations: role hierarchy, members, invites, provider keys and usage.
// Persistence lives in store.rs; everything else here is pure and unit-tested.

pub mod access;
pub mod handlers;
pub mod invites;
pub mod keys;
pub mod roles;
pub mod store;
pub mod usage;
