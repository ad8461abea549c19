//! Update engine
//!
//! Re-evaluates a root after the program stopped, tracks whether it went
//! out of or came back into scope, and walks the children that were already
//! listed to find out which values changed. Children that were never listed
//! are not created by an update.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{Result, VarobjError};
use crate::guard::{FrameRestore, SchedulerLock};
use crate::safe::{self, Comparison};
use crate::store::{fixup_value, pc_in_valid_block, EvalContext, VarobjStore};
use crate::target::Target;
use crate::types::{same_type, TypeRef};
use crate::value::Value;
use crate::varobj::VarobjId;

/// How the type of a reported object changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeChange {
    Unchanged,
    /// The root was re-created with a different static type.
    Changed,
    /// The most-derived type of a pointer or reference changed.
    DynamicChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub id: VarobjId,
    pub type_change: TypeChange,
}

/// Changed objects in traversal order: the root first, then descendants.
///
/// Consumed one entry at a time with [`ChangeList::pop`] or as an iterator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeList {
    entries: VecDeque<ChangeEntry>,
}

impl ChangeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, id: VarobjId, type_change: TypeChange) {
        self.entries.push_back(ChangeEntry { id, type_change });
    }

    pub fn pop(&mut self) -> Option<ChangeEntry> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChangeEntry> {
        self.entries.iter()
    }

    pub fn contains(&self, id: VarobjId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }
}

impl Iterator for ChangeList {
    type Item = ChangeEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.pop()
    }
}

/// Result of [`VarobjStore::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    NoChange,
    Changed(ChangeList),
    /// The root was replaced by an object of a different type; its children
    /// are gone and will be created again when listed.
    TypeChanged(ChangeList),
    /// The root was in scope before and is not anymore.
    ScopeExit,
}

impl UpdateStatus {
    /// Changed objects, empty for `NoChange` and `ScopeExit`.
    pub fn changes(&self) -> Option<&ChangeList> {
        match self {
            UpdateStatus::Changed(changes) | UpdateStatus::TypeChanged(changes) => Some(changes),
            UpdateStatus::NoChange | UpdateStatus::ScopeExit => None,
        }
    }

    pub fn into_changes(self) -> ChangeList {
        match self {
            UpdateStatus::Changed(changes) | UpdateStatus::TypeChanged(changes) => changes,
            UpdateStatus::NoChange | UpdateStatus::ScopeExit => ChangeList::new(),
        }
    }

    pub fn num_changes(&self) -> usize {
        self.changes().map_or(0, ChangeList::len)
    }

    pub fn is_scope_exit(&self) -> bool {
        matches!(self, UpdateStatus::ScopeExit)
    }

    pub fn is_type_changed(&self) -> bool {
        matches!(self, UpdateStatus::TypeChanged(_))
    }
}

fn same_dynamic_type(a: Option<&TypeRef>, b: Option<&TypeRef>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => same_type(a, b),
        _ => false,
    }
}

impl VarobjStore {
    /// Re-evaluate a root and every child created so far.
    ///
    /// Fails with [`VarobjError::NotRoot`] for children. Evaluation problems
    /// never fail the update: they mark objects as in error, or report the
    /// root as out of scope.
    pub fn update(&mut self, target: &mut dyn Target, id: VarobjId) -> Result<UpdateStatus> {
        if !self.get(id).is_root() {
            return Err(VarobjError::NotRoot);
        }
        let mut lock = SchedulerLock::acquire(target, self.config.runs_all_threads);
        let target: &mut dyn Target = &mut *lock;
        let mut changes = ChangeList::new();

        let (new_value, type_change) = self.value_of_root(target, id);
        let Some(new_value) = new_value else {
            let was_in_scope = self.root_info(id).in_scope;
            let root = self.get_mut(id);
            root.error = true;
            root.root_info_mut().in_scope = false;
            if was_in_scope {
                debug!("{} went out of scope", root.name());
                return Ok(UpdateStatus::ScopeExit);
            }
            return Ok(UpdateStatus::NoChange);
        };

        let came_in_scope = !self.root_info(id).in_scope;
        if came_in_scope {
            debug!("{} came into scope", self.get(id).name());
        }
        self.get_mut(id).root_info_mut().in_scope = true;

        let root_error = self.get(id).error;
        if type_change == TypeChange::Changed {
            changes.push(id, TypeChange::Changed);
        } else {
            let changeable = self.is_changeable(id);
            let cmp = self.compare(target, id, Some(&new_value));
            let root = self.get(id);
            if came_in_scope
                || type_change == TypeChange::DynamicChanged
                || (changeable && (root.updated || !cmp.equal))
            {
                changes.push(id, type_change);
            }
            let root = self.get_mut(id);
            root.updated = false;
            root.error = cmp.new_errored || root_error;
        }
        self.get_mut(id).replace_value(Some(new_value));

        // Children are visited in index order, each one before its own children.
        let mut stack: Vec<VarobjId> = self.get(id).children.values().rev().copied().collect();
        while let Some(child) = stack.pop() {
            let (parent, index) = {
                let obj = self.get(child);
                match obj.parent() {
                    Some(parent) => (parent, obj.index()),
                    None => panic!("child {} has no parent", obj.name()),
                }
            };
            let (new_value, type_change) = self.value_of_child(target, parent, index);
            let changeable = self.is_changeable(child);
            let cmp = self.compare(target, child, new_value.as_ref());
            let obj = self.get(child);
            let fake = obj.is_fake();
            if type_change != TypeChange::Unchanged
                || came_in_scope
                || (changeable && (obj.updated || !cmp.equal))
            {
                trace!("{} changed", obj.name());
                changes.push(child, type_change);
            }
            let obj = self.get_mut(child);
            obj.updated = false;
            obj.error = cmp.new_errored || (new_value.is_none() && !fake);
            obj.replace_value(new_value);

            if type_change == TypeChange::Unchanged {
                stack.extend(self.get(child).children.values().rev().copied());
            } else {
                self.invalidate_children(child);
            }
        }

        Ok(if type_change == TypeChange::Changed {
            UpdateStatus::TypeChanged(changes)
        } else if changes.is_empty() {
            UpdateStatus::NoChange
        } else {
            UpdateStatus::Changed(changes)
        })
    }

    /// Compare the stored value of `id` with `new`. Aggregates are compared
    /// through their children and always compare equal here.
    fn compare(&self, target: &mut dyn Target, id: VarobjId, new: Option<&Value>) -> Comparison {
        if !self.is_changeable(id) {
            return Comparison {
                equal: true,
                new_errored: false,
            };
        }
        safe::value_equal(target, self.get(id).value(), new)
    }

    /// The current value of a child, derived from its parent's value, with
    /// the child's dynamic type brought up to date.
    pub(crate) fn value_of_child(
        &mut self,
        target: &mut dyn Target,
        parent: VarobjId,
        index: usize,
    ) -> (Option<Value>, TypeChange) {
        let strategy = self.language(parent).strategy();
        let value = strategy.value_of_child(self, target, parent, index);
        let child = self.child(parent, index);
        if self.get(child).is_fake() {
            return (value, TypeChange::Unchanged);
        }
        let Some(value) = value else {
            return (None, TypeChange::Unchanged);
        };

        let (mut value, dynamic) = fixup_value(target, value, self.config.use_dynamic_type);
        let mut change = TypeChange::Unchanged;
        let obj = self.get_mut(child);
        if !same_dynamic_type(obj.dynamic_type(), dynamic.as_ref()) {
            obj.set_dynamic_type(dynamic);
            if self.config.use_dynamic_type {
                change = TypeChange::DynamicChanged;
            }
        }
        if value.is_lazy() && safe::fetch_lazy(target, &mut value).is_err() {
            return (None, change);
        }
        (Some(value), change)
    }

    /// Re-resolve and re-evaluate a root. `None` means it is out of scope or
    /// could not be evaluated.
    fn value_of_root(
        &mut self,
        target: &mut dyn Target,
        id: VarobjId,
    ) -> (Option<Value>, TypeChange) {
        let mut type_change = TypeChange::Unchanged;
        let info = self.root_info(id);
        if info.use_selected_frame || self.get(id).ty().is_none() {
            match self.reresolve_root(target, id) {
                Some(change) => type_change = change,
                None => return (None, TypeChange::Unchanged),
            }
        }
        let (value, dynamic_change) = self.evaluate_root(target, id);
        if type_change == TypeChange::Unchanged {
            type_change = dynamic_change;
        }
        (value, type_change)
    }

    /// Resolve the root's expression again from its text. The root keeps its
    /// identity when the printed type is unchanged and is replaced otherwise.
    ///
    /// Roots not bound to the selected frame, including those whose type was
    /// unknown at creation, resolve against the current frame. They do not
    /// become selected-frame roots.
    fn reresolve_root(&mut self, target: &mut dyn Target, id: VarobjId) -> Option<TypeChange> {
        let info = self.root_info(id);
        let context = if info.use_selected_frame {
            EvalContext::SelectedFrame
        } else {
            EvalContext::CurrentFrame
        };
        let expression = self.get(id).name().to_string();
        let fresh = match self.resolve_root(target, id, &expression, context) {
            Ok(fresh) => fresh,
            Err(err) => {
                debug!("cannot resolve {} again: {}", expression, err);
                return None;
            }
        };
        let fresh_type = fresh.ty()?.to_string();
        fresh.root_info()?.expr.as_ref()?;

        let old_type = self.get(id).ty().map(|ty| ty.to_string());
        if old_type.as_deref() == Some(fresh_type.as_str()) {
            let Some(fresh_info) = fresh.root_info else {
                return None;
            };
            let info = self.get_mut(id).root_info_mut();
            info.expr = fresh_info.expr;
            info.frame = fresh_info.frame;
            if let (Some(old), Some(new)) = (info.valid_block, fresh_info.valid_block) {
                if old != new {
                    info.valid_block = Some(new);
                }
            }
            return Some(TypeChange::Unchanged);
        }

        debug!(
            "{} changed type from {} to {}",
            expression,
            old_type.as_deref().unwrap_or("<unknown>"),
            fresh_type
        );
        self.replace_root(id, fresh);
        Some(TypeChange::Changed)
    }

    /// Evaluate the root's compiled expression in its frame.
    fn evaluate_root(&mut self, target: &mut dyn Target, id: VarobjId) -> (Option<Value>, TypeChange) {
        let use_dynamic_type = self.config.use_dynamic_type;
        let info = self.root_info(id);
        let in_scope = info.use_selected_frame || pc_in_valid_block(target, info.valid_block, info.frame);
        if !in_scope {
            return (None, TypeChange::Unchanged);
        }

        let mut restore = FrameRestore::new(target);
        if let Some(frame) = info.frame.filter(|_| !info.use_selected_frame) {
            if restore.frame_exists(frame) {
                restore.select(frame);
            }
        }
        let result = match info.expr.as_ref() {
            Some(expr) => safe::evaluate(&mut *restore, expr),
            None => {
                self.get_mut(id).error = true;
                return (None, TypeChange::Unchanged);
            }
        };
        let value = match result {
            Ok(value) => value,
            Err(err) => {
                debug!("cannot evaluate {}: {}", self.get(id).name(), err);
                self.get_mut(id).error = true;
                return (None, TypeChange::Unchanged);
            }
        };

        let (mut value, dynamic) = fixup_value(&mut *restore, value, use_dynamic_type);
        let mut change = TypeChange::Unchanged;
        if use_dynamic_type && !same_dynamic_type(self.get(id).dynamic_type(), dynamic.as_ref()) {
            change = TypeChange::DynamicChanged;
            self.get_mut(id).set_dynamic_type(dynamic);
            self.invalidate_children(id);
        } else {
            self.get_mut(id).set_dynamic_type(dynamic);
        }

        let fetched = !value.is_lazy() || safe::fetch_lazy(&mut *restore, &mut value).is_ok();
        self.get_mut(id).error = !fetched;
        (Some(value), change)
    }
}
