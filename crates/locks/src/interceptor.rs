// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Storefront Contributors
//
// This file is part of Storefront.
//
// Storefront is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// Storefront is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with Storefront. If not, see <https://www.gnu.org/licenses/>.

//! Declarative lock interception.
//!
//! ## Purpose
//! Lets a business operation declare "hold lock L for my whole unit of work"
//! instead of hand-writing acquire/release at every call site. A [`LockSpec`]
//! names the domain, the resource type and a [`ResourceIdExpr`] that picks the
//! resource id out of the live call arguments ([`LockArgs`]).
//!
//! ## Ordering
//! The closure handed to [`LockInterceptor::around`] is the unit of work,
//! transaction included. The lock is therefore taken before the transaction
//! begins and released after it commits or rolls back; two callers can never
//! both pass their validation reads before either commits.
//!
//! ## Expressions
//! ```text
//! #eventId                          direct argument
//! #request.coupon.id                dotted path into an argument
//! 'days_' + days + '_limit_' + limit concatenation with literals
//! ```
//! The leading `#` is optional. Only scalar leaves (string, number, bool)
//! resolve; everything else fails with
//! [`LockError::ResourceIdResolution`] before any lock is attempted.

use crate::{DistributedLockManager, DomainResource, LockError, LockResult};
use serde::Serialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Expression resolving a resource id from call arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceIdExpr {
    /// Constant text
    Literal(String),
    /// Argument reference; `fields` walks into nested objects
    Path {
        /// Argument name
        arg: String,
        /// Field path inside the argument (empty for the argument itself)
        fields: Vec<String>,
    },
    /// Concatenation of sub-expressions
    Concat(Vec<ResourceIdExpr>),
}

impl ResourceIdExpr {
    /// Constant id.
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    /// Direct argument reference.
    pub fn arg(name: impl Into<String>) -> Self {
        Self::Path {
            arg: name.into(),
            fields: Vec::new(),
        }
    }

    /// Dotted path such as `request.couponId`.
    pub fn path(dotted: &str) -> Self {
        let mut segments = dotted.trim_start_matches('#').split('.').map(str::to_string);
        let arg = segments.next().unwrap_or_default();
        Self::Path {
            arg,
            fields: segments.collect(),
        }
    }

    /// Concatenation of several parts.
    pub fn concat(parts: impl IntoIterator<Item = ResourceIdExpr>) -> Self {
        Self::Concat(parts.into_iter().collect())
    }

    /// Parse the compact textual form, e.g. `'days_' + #days + '_limit_' + #limit`.
    pub fn parse(text: &str) -> LockResult<Self> {
        let mut parts = Vec::new();
        let mut chars = text.char_indices().peekable();
        let mut expect_part = true;

        while let Some(&(pos, c)) = chars.peek() {
            if c.is_whitespace() {
                chars.next();
                continue;
            }
            if !expect_part {
                if c != '+' {
                    return Err(parse_error(text, pos, "expected '+'"));
                }
                chars.next();
                expect_part = true;
                continue;
            }

            if c == '\'' {
                chars.next();
                let mut literal = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '\'' {
                        closed = true;
                        break;
                    }
                    literal.push(c);
                }
                if !closed {
                    return Err(parse_error(text, pos, "unterminated literal"));
                }
                parts.push(Self::Literal(literal));
            } else {
                let mut path = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || c == '+' {
                        break;
                    }
                    path.push(c);
                    chars.next();
                }
                let trimmed = path.strip_prefix('#').unwrap_or(&path);
                if !trimmed.split('.').all(is_identifier) {
                    return Err(parse_error(text, pos, "invalid argument path"));
                }
                parts.push(Self::path(trimmed));
            }
            expect_part = false;
        }

        if expect_part {
            return Err(parse_error(text, text.len(), "expected an argument or literal"));
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Self::Concat(parts)
        })
    }

    /// Resolve against live arguments.
    pub fn resolve(&self, args: &LockArgs) -> LockResult<String> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Path { arg, fields } => {
                let mut current = args.get(arg).ok_or_else(|| {
                    LockError::ResourceIdResolution(format!("unknown argument `{}`", arg))
                })?;
                let mut walked = arg.clone();
                for field in fields {
                    current = match current {
                        Value::Object(map) => map.get(field).ok_or_else(|| {
                            LockError::ResourceIdResolution(format!(
                                "`{}` has no field `{}`",
                                walked, field
                            ))
                        })?,
                        Value::Null => {
                            return Err(LockError::ResourceIdResolution(format!(
                                "`{}` is null, cannot read `{}`",
                                walked, field
                            )))
                        }
                        _ => {
                            return Err(LockError::ResourceIdResolution(format!(
                                "`{}` is not an object, cannot read `{}`",
                                walked, field
                            )))
                        }
                    };
                    walked.push('.');
                    walked.push_str(field);
                }
                scalar_to_string(&walked, current)
            }
            Self::Concat(parts) => parts.iter().map(|part| part.resolve(args)).collect(),
        }
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_error(text: &str, pos: usize, reason: &str) -> LockError {
    LockError::ResourceIdResolution(format!(
        "cannot parse `{}` at offset {}: {}",
        text, pos, reason
    ))
}

fn scalar_to_string(path: &str, value: &Value) -> LockResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Err(LockError::ResourceIdResolution(format!("`{}` is null", path))),
        _ => Err(LockError::ResourceIdResolution(format!(
            "`{}` is not a scalar value",
            path
        ))),
    }
}

/// Named call arguments, captured as JSON values.
#[derive(Debug, Clone, Default)]
pub struct LockArgs {
    values: Map<String, Value>,
}

impl LockArgs {
    /// Empty argument set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an argument (builder style).
    pub fn with<T: Serialize + ?Sized>(mut self, name: &str, value: &T) -> LockResult<Self> {
        self.insert(name, value)?;
        Ok(self)
    }

    /// Add an argument.
    pub fn insert<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> LockResult<()> {
        self.values.insert(name.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Use the fields of a struct as the arguments.
    pub fn from_struct<T: Serialize + ?Sized>(value: &T) -> LockResult<Self> {
        match serde_json::to_value(value)? {
            Value::Object(values) => Ok(Self { values }),
            other => Err(LockError::Serialization(format!(
                "lock arguments must serialize to an object, got {}",
                other
            ))),
        }
    }

    /// Look up an argument by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

/// Lock declaration attached to an operation.
#[derive(Debug, Clone)]
pub struct LockSpec {
    domain: String,
    resource_type: String,
    resource_id: ResourceIdExpr,
    timeout: Option<Duration>,
}

impl LockSpec {
    /// Declare a lock on `domain:resource_type:<resource_id>`.
    pub fn new(domain: impl Into<String>, resource_type: impl Into<String>, resource_id: ResourceIdExpr) -> Self {
        Self {
            domain: domain.into(),
            resource_type: resource_type.into(),
            resource_id,
            timeout: None,
        }
    }

    /// Declare a lock with a textual resource id expression.
    pub fn parse(domain: impl Into<String>, resource_type: impl Into<String>, expr: &str) -> LockResult<Self> {
        Ok(Self::new(domain, resource_type, ResourceIdExpr::parse(expr)?))
    }

    /// Override the wait timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Domain prefix.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Resource type.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Wait timeout, if overridden.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Resolve this spec for one invocation.
    pub fn resolve(&self, args: &LockArgs) -> LockResult<DomainResource> {
        let resource_id = self.resource_id.resolve(args)?;
        if resource_id.trim().is_empty() {
            return Err(LockError::ResourceIdResolution(format!(
                "{:?} resolved to an empty id",
                self.resource_id
            )));
        }
        Ok(DomainResource::new(
            self.domain.clone(),
            self.resource_type.clone(),
            resource_id,
        ))
    }
}

/// Applies lock specs around operations.
#[derive(Clone)]
pub struct LockInterceptor {
    manager: DistributedLockManager,
}

impl LockInterceptor {
    /// Create an interceptor backed by `manager`.
    pub fn new(manager: DistributedLockManager) -> Self {
        Self { manager }
    }

    /// Underlying lock manager.
    pub fn manager(&self) -> &DistributedLockManager {
        &self.manager
    }

    /// Resolve `spec` against `args`, then run `operation` under the lock.
    ///
    /// Resolution errors surface before any lock attempt. The operation's
    /// own errors are returned unchanged after release.
    pub async fn around<T, E, F, Fut>(&self, spec: &LockSpec, args: &LockArgs, operation: F) -> Result<T, E>
    where
        E: From<LockError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let resource = spec.resolve(args)?;
        let timeout = spec.timeout.unwrap_or(self.manager.config().default_wait_timeout);
        debug!(
            domain = %resource.domain,
            resource_type = %resource.resource_type,
            resource_id = %resource.resource_id,
            "Intercepting operation with lock"
        );
        self.manager
            .execute_with_domain_lock(
                &resource.domain,
                &resource.resource_type,
                &resource.resource_id,
                timeout,
                operation,
            )
            .await
    }

    /// Composite variant: lock every spec (in global key order) around `operation`.
    ///
    /// Each acquisition waits up to the largest timeout declared by `specs`.
    pub async fn around_all<T, E, F, Fut>(&self, specs: &[LockSpec], args: &LockArgs, operation: F) -> Result<T, E>
    where
        E: From<LockError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let resources = specs
            .iter()
            .map(|spec| spec.resolve(args))
            .collect::<LockResult<Vec<_>>>()?;
        let default_timeout = self.manager.config().default_wait_timeout;
        let timeout = specs
            .iter()
            .map(|spec| spec.timeout.unwrap_or(default_timeout))
            .max()
            .unwrap_or(default_timeout);
        self.manager
            .with_domain_locks(&resources, timeout, true, operation)
            .await
    }

    /// Bind `spec` to a typed operation, returning a reusable decorated call.
    pub fn wrap<F>(&self, spec: LockSpec, operation: F) -> Locked<F> {
        Locked {
            interceptor: self.clone(),
            spec,
            operation,
        }
    }
}

/// Operation decorated with a lock spec.
///
/// The argument struct's fields are the names its [`LockSpec`] expression refers to.
pub struct Locked<F> {
    interceptor: LockInterceptor,
    spec: LockSpec,
    operation: F,
}

impl<F> Locked<F> {
    /// Invoke the operation under its lock.
    pub async fn call<A, T, E, Fut>(&self, args: A) -> Result<T, E>
    where
        A: Serialize,
        E: From<LockError>,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let lock_args = LockArgs::from_struct(&args)?;
        self.interceptor
            .around(&self.spec, &lock_args, || (self.operation)(args))
            .await
    }

    /// Declared lock spec.
    pub fn spec(&self) -> &LockSpec {
        &self.spec
    }
}
