//! `orgdir-directory` — directory domain model.
//!
//! Entities (enterprises, departments, employees, users, roles), their
//! transfer representations, and the projection rules between the two.
//!
//! Projection contract:
//! - `shallow(entity)` carries scalar attributes only; relation lists stay
//!   empty. Listings use this shape.
//! - `detailed(entity, related)` additionally populates the relation list
//!   with one level of shallow projections. Lookups by id use this shape;
//!   relations of relations are never serialized.
//! - `copy_scalars(dto)` copies scalar attributes onto an entity in place
//!   and leaves relation sets alone — resolving relation ids is the
//!   service's job, since it owns foreign-reference resolution.

pub mod department;
pub mod employee;
pub mod enterprise;
pub mod user;

pub use department::{Department, DepartmentDto};
pub use employee::{Employee, EmployeeDto};
pub use enterprise::{Enterprise, EnterpriseDto};
pub use user::{CreateUserDto, Role, RoleDto, User, UserDto};
