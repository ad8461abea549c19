//! Variable object store
//!
//! The store owns every variable object of a debugging session: the node
//! arena, the registry of object names and the list of roots. All
//! operations of the API take the store and the target explicitly.
//!
//! Roots are created from an expression and an evaluation context. Their
//! children are created on demand when listed and are kept, with their
//! identity, until deleted or invalidated by a type change.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::VarobjConfig;
use crate::error::{Result, VarobjError};
use crate::format::DisplayFormat;
use crate::guard::{FrameRestore, SchedulerLock};
use crate::lang::Language;
use crate::safe;
use crate::target::{Block, FrameId, Target};
use crate::types::{check_typedef, Type, TypeKind, TypeRef};
use crate::value::Value;
use crate::varobj::{NodeKind, RootInfo, Varobj, VarobjId};

/// Where a root expression is resolved and evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvalContext {
    /// The selected frame at creation time.
    CurrentFrame,
    /// Whatever frame is selected at each update.
    SelectedFrame,
    /// The frame with this identity.
    Frame(FrameId),
    /// The given block, in the selected frame.
    BlockInFrame(Block),
    /// The given block, without any frame.
    NoFrameNeeded(Block),
}

/// Attribute bits of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Attributes {
    pub editable: bool,
}

impl Attributes {
    pub const EDITABLE: u32 = 0x1;

    pub fn bits(&self) -> u32 {
        if self.editable {
            Self::EDITABLE
        } else {
            0
        }
    }
}

/// Owned context holding all variable objects of a session.
#[derive(Debug, Default)]
pub struct VarobjStore {
    pub(crate) config: VarobjConfig,
    objects: HashMap<VarobjId, Varobj>,
    names: HashMap<String, VarobjId>,
    /// Installed roots, most recent first.
    roots: Vec<VarobjId>,
    next_id: u64,
    name_counter: u64,
}

impl VarobjStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: VarobjConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &VarobjConfig {
        &self.config
    }

    /// Number of live objects, registered or not.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, id: VarobjId) -> bool {
        self.objects.contains_key(&id)
    }

    /// The object behind a handle. Handles of deleted objects must not be used.
    pub fn get(&self, id: VarobjId) -> &Varobj {
        match self.objects.get(&id) {
            Some(obj) => obj,
            None => panic!("variable object {} does not exist", id),
        }
    }

    pub(crate) fn get_mut(&mut self, id: VarobjId) -> &mut Varobj {
        match self.objects.get_mut(&id) {
            Some(obj) => obj,
            None => panic!("variable object {} does not exist", id),
        }
    }

    pub(crate) fn root_info(&self, id: VarobjId) -> &RootInfo {
        let root = self.get(id).root;
        match self.get(root).root_info() {
            Some(info) => info,
            None => panic!("variable object {} has a root without root data", id),
        }
    }

    /// The existing child at `index`.
    pub(crate) fn child(&self, parent: VarobjId, index: usize) -> VarobjId {
        match self.get(parent).children.get(&index) {
            Some(&child) => child,
            None => panic!(
                "variable object \"{}\" has no child {}",
                self.get(parent).name(),
                index
            ),
        }
    }

    /// The type children and values are derived from: the dynamic type when
    /// enabled and known, otherwise the static type, typedefs stripped.
    pub(crate) fn effective_type(&self, id: VarobjId) -> Option<TypeRef> {
        let obj = self.get(id);
        let ty = match (self.config.use_dynamic_type, obj.dynamic_type()) {
            (true, Some(dynamic)) => dynamic,
            _ => obj.ty()?,
        };
        Some(check_typedef(ty))
    }

    fn alloc_id(&mut self) -> VarobjId {
        self.next_id += 1;
        VarobjId(self.next_id)
    }

    /// Generate an object name that is not in use.
    pub fn gen_name(&mut self) -> String {
        loop {
            self.name_counter += 1;
            let name = format!("{}{}", self.config.name_prefix, self.name_counter);
            if !self.names.contains_key(&name) {
                return name;
            }
        }
    }

    /// Register `id` under `name`.
    fn install(&mut self, id: VarobjId, name: &str) -> Result<()> {
        if self.names.contains_key(name) {
            return Err(VarobjError::DuplicateName {
                name: name.to_string(),
            });
        }
        self.names.insert(name.to_string(), id);
        let obj = self.get_mut(id);
        obj.obj_name = Some(name.to_string());
        if obj.is_root() {
            self.roots.insert(0, id);
        }
        debug!("Installed {}", name);
        Ok(())
    }

    fn uninstall(&mut self, id: VarobjId, name: &str) {
        debug!("Deleting {}", name);
        match self.names.remove(name) {
            Some(registered) if registered == id => {}
            Some(other) => panic!(
                "variable object name {} belongs to {}, not {}",
                name, other, id
            ),
            None => panic!("variable object {} is not registered", name),
        }
        self.roots.retain(|&root| root != id);
    }

    /// Create a root object for `expression`.
    ///
    /// With an `obj_name` the object is registered and listed among the roots;
    /// otherwise it is a temporary owned by the caller, who deletes it.
    pub fn create(
        &mut self,
        target: &mut dyn Target,
        obj_name: Option<&str>,
        expression: &str,
        context: EvalContext,
    ) -> Result<VarobjId> {
        let id = self.alloc_id();
        let root = {
            let mut lock = SchedulerLock::acquire(target, self.config.runs_all_threads);
            self.resolve_root(&mut *lock, id, expression, context)?
        };
        self.objects.insert(id, root);

        if let Some(name) = obj_name {
            if let Err(err) = self.install(id, name) {
                self.objects.remove(&id);
                return Err(err);
            }
        }
        Ok(id)
    }

    /// Compile and evaluate `expression`, producing an uninstalled root.
    pub(crate) fn resolve_root(
        &self,
        target: &mut dyn Target,
        id: VarobjId,
        expression: &str,
        context: EvalContext,
    ) -> Result<Varobj> {
        let (frame, block) = match context {
            EvalContext::CurrentFrame | EvalContext::SelectedFrame => {
                (target.selected_frame(), None)
            }
            EvalContext::BlockInFrame(block) => (target.selected_frame(), Some(block)),
            EvalContext::NoFrameNeeded(block) => (None, Some(block)),
            EvalContext::Frame(frame) => (Some(frame).filter(|&f| target.frame_exists(f)), None),
        };
        let block = block.or_else(|| frame.and_then(|f| target.frame_block(f)));
        let use_selected_frame = context == EvalContext::SelectedFrame;

        let expr = match safe::compile(target, expression, block) {
            Ok(expr) if expr.is_type() => {
                warn!("Attempt to use a type name as an expression: {}", expression);
                return Err(VarobjError::TypeName {
                    expression: expression.to_string(),
                });
            }
            Ok(expr) => Some(expr),
            // Resolved again on each update, once a frame that knows it is selected.
            Err(err) if use_selected_frame => {
                debug!("{} not resolvable in the selected frame: {}", expression, err);
                None
            }
            Err(source) => {
                return Err(VarobjError::Parse {
                    expression: expression.to_string(),
                    source,
                })
            }
        };

        let mut root = Varobj::new_root(id, expression, RootInfo::new(use_selected_frame));
        let Some(expr) = expr else {
            return Ok(root);
        };

        let valid_block = expr.innermost_block();
        let mut restore = FrameRestore::new(target);
        if let Some(frame) = frame {
            restore.select(frame);
        }
        let evaluate = use_selected_frame
            || matches!(context, EvalContext::NoFrameNeeded(_))
            || pc_in_valid_block(&*restore, valid_block, frame);
        let value = if evaluate {
            safe::evaluate(&mut *restore, &expr).ok()
        } else {
            None
        };

        let mut in_scope = false;
        let mut keep_expr = true;
        match value {
            Some(value) => {
                in_scope = true;
                root.set_type(Some(value.ty().clone()));
                let (mut value, dynamic) =
                    fixup_value(&mut *restore, value, self.config.use_dynamic_type);
                if value.is_lazy() && safe::fetch_lazy(&mut *restore, &mut value).is_err() {
                    root.error = true;
                }
                root.set_dynamic_type(dynamic);
                root.replace_value(Some(value));
            }
            None => match safe::evaluate_type(&mut *restore, &expr) {
                Ok(ty) => root.set_type(Some(ty)),
                Err(err) => {
                    debug!("cannot determine the type of {}: {}", expression, err);
                    keep_expr = false;
                }
            },
        }

        let info = root.root_info_mut();
        info.valid_block = valid_block;
        info.frame = frame;
        info.in_scope = in_scope;
        if keep_expr {
            info.language = Language::from_source(expr.language());
            info.expr = Some(expr);
        }
        Ok(root)
    }

    pub fn lookup(&self, obj_name: &str) -> Result<VarobjId> {
        self.names
            .get(obj_name)
            .copied()
            .ok_or_else(|| VarobjError::NotFound {
                name: obj_name.to_string(),
            })
    }

    /// Installed roots, most recently created first.
    pub fn list_roots(&self) -> Vec<VarobjId> {
        self.roots.clone()
    }

    /// Delete an object and all its descendants, or only the descendants.
    ///
    /// Returns the registered names of the deleted objects, each child
    /// before its parent; the number of names is the number of registry
    /// entries removed.
    pub fn delete(&mut self, id: VarobjId, only_children: bool) -> Vec<String> {
        let mut deleted = Vec::new();
        self.delete_inner(id, only_children, true, &mut deleted);
        deleted
    }

    fn delete_inner(
        &mut self,
        id: VarobjId,
        only_children: bool,
        remove_from_parent: bool,
        deleted: &mut Vec<String>,
    ) {
        let children: Vec<VarobjId> = self.get(id).children.values().copied().collect();
        for child in children {
            self.delete_inner(child, false, false, deleted);
        }
        if only_children {
            let obj = self.get_mut(id);
            obj.children.clear();
            obj.num_children = None;
            return;
        }

        let obj = match self.objects.remove(&id) {
            Some(obj) => obj,
            None => panic!("variable object {} does not exist", id),
        };
        if let Some(name) = obj.obj_name.as_deref() {
            self.uninstall(id, name);
            deleted.push(name.to_string());
        }
        if remove_from_parent {
            if let Some(parent) = obj.parent {
                match self.get_mut(parent).children.remove(&obj.index) {
                    Some(child) if child == id => {}
                    _ => panic!(
                        "variable object \"{}\" is missing from its parent's children",
                        obj.name
                    ),
                }
            }
        }
    }

    pub fn set_format(&mut self, id: VarobjId, format: DisplayFormat) -> DisplayFormat {
        self.get_mut(id).format = format;
        format
    }

    pub fn format(&self, id: VarobjId) -> DisplayFormat {
        self.get(id).format
    }

    /// Number of children, computed once and cached. `None` when the root
    /// expression is not resolved or the count cannot be determined.
    pub fn get_num_children(&mut self, id: VarobjId) -> Option<usize> {
        self.root_info(id).expr.as_ref()?;
        if let Some(count) = self.get(id).num_children {
            return Some(count);
        }
        let count = self.language(id).strategy().number_of_children(self, id)?;
        self.get_mut(id).num_children = Some(count);
        Some(count)
    }

    /// Child count without caching it.
    pub(crate) fn peek_num_children(&self, id: VarobjId) -> Option<usize> {
        self.root_info(id).expr.as_ref()?;
        self.get(id)
            .num_children
            .or_else(|| self.language(id).strategy().number_of_children(self, id))
    }

    /// Immediate children in index order, creating the missing ones.
    pub fn list_children(&mut self, target: &mut dyn Target, id: VarobjId) -> Result<Vec<VarobjId>> {
        let count = self
            .get_num_children(id)
            .ok_or_else(|| VarobjError::UnknownChildCount {
                expression: self.get(id).name().to_string(),
            })?;
        let mut lock = SchedulerLock::acquire(target, self.config.runs_all_threads);
        let mut children = Vec::with_capacity(count);
        for index in 0..count {
            let child = match self.get(id).children.get(&index) {
                Some(&child) => child,
                None => self.create_child(&mut *lock, id, index),
            };
            children.push(child);
        }
        Ok(children)
    }

    fn create_child(&mut self, target: &mut dyn Target, parent: VarobjId, index: usize) -> VarobjId {
        let strategy = self.language(parent).strategy();
        let name = strategy.name_of_child(self, parent, index);
        let kind = match strategy.child_access_group(self, parent, index) {
            Some(access) => NodeKind::AccessGroup(access),
            None => NodeKind::real(),
        };
        let parent_obj = self.get(parent);
        let obj_name = parent_obj
            .obj_name()
            .map(|parent_name| format!("{}.{}", parent_name, name));
        let root = parent_obj.root;

        let id = self.alloc_id();
        let child = Varobj::new_child(name, None, kind, parent, index, root);
        self.objects.insert(id, child);
        if let Some(obj_name) = obj_name {
            if let Err(err) = self.install(id, &obj_name) {
                warn!("child left unregistered: {}", err);
            }
        }
        self.get_mut(parent).children.insert(index, id);

        let ty = strategy.type_of_child(self, parent, index);
        let (value, _) = self.value_of_child(target, parent, index);
        let parent_error = self.get(parent).error;
        let child = self.get_mut(id);
        if !child.is_fake() {
            child.set_type(ty);
        }
        child.error = (!child.is_fake() && value.is_none()) || parent_error;
        child.replace_value(value);
        id
    }

    /// Printable static type. `None` for access groups.
    pub fn get_type(&self, id: VarobjId) -> Option<String> {
        let obj = self.get(id);
        if obj.is_fake() {
            return None;
        }
        Some(match obj.ty() {
            Some(ty) => ty.to_string(),
            None => "<error getting type>".to_string(),
        })
    }

    /// Printable most-derived type; empty when unknown.
    pub fn get_dynamic_type(&self, id: VarobjId) -> String {
        self.get(id)
            .dynamic_type()
            .map(|ty| ty.to_string())
            .unwrap_or_default()
    }

    /// The type children are derived from.
    pub fn get_type_struct(&self, id: VarobjId) -> Option<TypeRef> {
        self.effective_type(id)
    }

    /// Expression that evaluates to this object from scratch.
    pub fn path_expr(&self, id: VarobjId) -> String {
        let obj = self.get(id);
        if let Some(path) = obj.path_expr.get() {
            return path.clone();
        }
        let path = match obj.parent {
            None => obj.name.clone(),
            Some(parent) => self
                .language(parent)
                .strategy()
                .path_expr_of_child(self, parent, id),
        };
        obj.path_expr.get_or_init(|| path).clone()
    }

    pub fn in_scope(&self, id: VarobjId) -> bool {
        self.root_info(id).in_scope
    }

    pub fn editable(&self, id: VarobjId) -> bool {
        self.language(id).strategy().editable(self, id)
    }

    pub fn attributes(&self, id: VarobjId) -> Attributes {
        Attributes {
            editable: self.editable(id),
        }
    }

    /// Address range of the block the root was resolved in; `None` for
    /// global scope.
    pub fn valid_block(&self, id: VarobjId) -> Option<Block> {
        self.root_info(id).valid_block
    }

    /// Printable value. `None` when there is no value to show.
    pub fn get_value(&self, id: VarobjId) -> Option<String> {
        self.root_info(id).expr.as_ref()?;
        let obj = self.get(id);
        if obj.is_fake() {
            return Some(String::new());
        }
        obj.value()?;
        self.language(id).strategy().value_to_string(self, id)
    }

    /// Assign the value of `expression` to the object.
    ///
    /// The object must have a value, be editable and not be in error. The
    /// next update reports the object as changed.
    pub fn set_value(&mut self, target: &mut dyn Target, id: VarobjId, expression: &str) -> Result<()> {
        let mut lock = SchedulerLock::acquire(target, self.config.runs_all_threads);
        let obj = self.get(id);
        let Some(current) = obj.value() else {
            return Err(VarobjError::NotEditable);
        };
        if obj.error || !self.editable(id) {
            return Err(VarobjError::NotEditable);
        }

        let expr = safe::compile(&*lock, expression, None).map_err(|source| VarobjError::Parse {
            expression: expression.to_string(),
            source,
        })?;
        let assign_error = |source| VarobjError::Assign {
            expression: expression.to_string(),
            source,
        };
        let new_value = safe::evaluate(&mut *lock, &expr).map_err(assign_error)?;
        let stored = safe::assign(&mut *lock, current, &new_value).map_err(assign_error)?;

        let obj = self.get_mut(id);
        obj.updated = true;
        obj.replace_value(Some(stored));
        Ok(())
    }

    pub fn get_expression(&self, id: VarobjId) -> &str {
        self.get(id).name()
    }

    pub fn get_objname(&self, id: VarobjId) -> Option<&str> {
        self.get(id).obj_name()
    }

    pub fn get_language(&self, id: VarobjId) -> Language {
        self.language(id)
    }

    pub fn is_fake_child(&self, id: VarobjId) -> bool {
        self.get(id).is_fake()
    }

    pub(crate) fn language(&self, id: VarobjId) -> Language {
        self.root_info(id).language
    }

    /// Whether a plain value change of the object is reported. Aggregates
    /// report changes through their children.
    pub(crate) fn is_changeable(&self, id: VarobjId) -> bool {
        if self.get(id).is_fake() {
            return false;
        }
        match self.effective_type(id) {
            Some(ty) => !matches!(
                ty.kind(),
                TypeKind::Struct(_) | TypeKind::Union(_) | TypeKind::Array { .. }
            ),
            None => false,
        }
    }

    /// Drop the children of an object and forget its child count.
    pub(crate) fn invalidate_children(&mut self, id: VarobjId) {
        self.delete(id, true);
    }

    /// Put `replacement` in place of the root `id`, keeping its handle and
    /// registered name.
    pub(crate) fn replace_root(&mut self, id: VarobjId, mut replacement: Varobj) {
        self.invalidate_children(id);
        let old = self.get_mut(id);
        replacement.obj_name = old.obj_name.take();
        replacement.root = id;
        *old = replacement;
    }
}

/// Whether the frame's program counter is inside the block. Global
/// expressions (no block) are always in scope.
pub(crate) fn pc_in_valid_block(
    target: &dyn Target,
    valid_block: Option<Block>,
    frame: Option<FrameId>,
) -> bool {
    let Some(block) = valid_block else {
        return true;
    };
    frame
        .and_then(|frame| target.frame_pc(frame))
        .is_some_and(|pc| block.contains(pc))
}

/// Record the most-derived type of pointer and reference values and, when
/// `use_dynamic_type` is set, view the value as that type.
///
/// Returns the value to store and its dynamic type.
pub(crate) fn fixup_value(
    target: &mut dyn Target,
    value: Value,
    use_dynamic_type: bool,
) -> (Value, Option<TypeRef>) {
    let static_type = check_typedef(value.ty());
    let dynamic = match static_type.kind() {
        TypeKind::Pointer(_) => safe::dynamic_type(target, &value).map(|ty| Type::pointer_to(&ty)),
        TypeKind::Reference(_) => {
            safe::dynamic_type(target, &value).map(|ty| Type::reference_to(&ty))
        }
        _ => None,
    };
    match dynamic {
        Some(dynamic) if use_dynamic_type => match safe::cast(target, &value, &dynamic) {
            Ok(cast) => (cast, Some(dynamic)),
            Err(err) => {
                debug!("cannot view value as {}: {}", dynamic, err);
                let ty = value.ty().clone();
                (value, Some(ty))
            }
        },
        dynamic => (value, dynamic),
    }
}
