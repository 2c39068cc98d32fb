//! 内存对象图运行时
//!
//! 以 JSON 快照描述一组对象、其属性与视图层级，按类型编码把每个属性值存成
//! 真实的字节布局（与实例变量在内存中的样子一致），并通过 [`AccessorInvoker`]
//! 等能力接口对外提供访问。命令行工具与测试都基于它运行。

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{AccessorInvoker, ObjectId, ObjectRuntime, ReferenceResolver, RuntimeProperty, Selector};
use crate::editors;
use crate::encoding::TypeClassification;
use crate::layout;
use crate::property::AttributeDescriptor;
use crate::utils::{parse_address_token, InspectorError, InvocationError};
use crate::value::{ObjectRef, Value};

/// setter 钩子：在写入前变换（如钳制）或拒绝传入的值
pub type SetterHook = Box<dyn Fn(Value) -> Result<Value, InvocationError> + Send + Sync>;

/// 快照文档
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    #[serde(default)]
    pub objects: Vec<SnapshotObject>,
    /// 视图层级（按深度优先顺序）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<SnapshotView>,
    /// 额外的可读内存区域（原始指针编辑使用）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regions: Vec<SnapshotRegion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotObject {
    /// 十六进制地址，如 "0x1000"
    pub address: String,
    pub class: String,
    /// 父类链（由近及远）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub superclasses: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<SnapshotProperty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotProperty {
    pub name: String,
    /// 运行时属性字符串，如 "Tq,N,V_count"
    pub attributes: String,
    /// 按属性类型编辑器语法书写的值
    pub value: String,
    /// 读取同一值的其他 getter
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub readers: Vec<Selector>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotView {
    pub address: String,
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRegion {
    pub start: String,
    pub size: usize,
}

/// 属性的后备存储
#[derive(Debug, Clone)]
struct PropertySlot {
    ty: TypeClassification,
    /// 无内存布局的类型为 None
    bytes: Option<Vec<u8>>,
    /// 无法编码时保留的原始文本
    fallback_text: String,
}

#[derive(Debug, Clone)]
enum Accessor {
    Getter(String),
    Setter(String),
}

#[derive(Debug, Clone)]
struct LiveObject {
    class_name: String,
    superclasses: Vec<String>,
    properties: Vec<RuntimeProperty>,
    readers: HashMap<String, Vec<Selector>>,
    slots: HashMap<String, PropertySlot>,
    accessors: HashMap<Selector, Accessor>,
    alive: bool,
}

impl LiveObject {
    fn is_kind_of(&self, class_name: &str) -> bool {
        self.class_name == class_name || self.superclasses.iter().any(|c| c == class_name)
    }
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<usize, LiveObject>,
    /// 插入顺序
    order: Vec<usize>,
    views: Vec<(ObjectId, usize)>,
    regions: Vec<(usize, usize)>,
}

impl State {
    fn live_object(&self, target: ObjectId) -> Result<&LiveObject, InvocationError> {
        if target.is_nil() {
            return Err(InvocationError::NilTarget);
        }
        self.objects
            .get(&target.address())
            .filter(|obj| obj.alive)
            .ok_or(InvocationError::TargetDeallocated(target.address()))
    }

    fn resolve(&self, address: usize) -> Option<ObjectRef> {
        self.objects
            .get(&address)
            .filter(|obj| obj.alive)
            .map(|obj| ObjectRef::new(address, obj.class_name.clone()))
    }

    /// 为解码出的对象引用补上类名
    fn describe_references(&self, value: Value) -> Value {
        match value {
            Value::Object(object) if !object.is_nil() => {
                let class_name = self.objects.get(&object.address).map(|obj| obj.class_name.clone());
                Value::Object(ObjectRef { address: object.address, class_name })
            }
            Value::Struct(values) => {
                Value::Struct(values.into_iter().map(|v| self.describe_references(v)).collect())
            }
            Value::Array(values) => {
                Value::Array(values.into_iter().map(|v| self.describe_references(v)).collect())
            }
            other => other,
        }
    }

    /// 值中引用的对象是否都存活
    fn dangling_reference(&self, value: &Value) -> Option<usize> {
        match value {
            Value::Object(object) if !object.is_nil() => {
                self.resolve(object.address).is_none().then_some(object.address)
            }
            Value::Struct(values) | Value::Array(values) => {
                values.iter().find_map(|v| self.dangling_reference(v))
            }
            _ => None,
        }
    }
}

/// 基于内存对象图的运行时
#[derive(Default)]
pub struct SnapshotRuntime {
    state: RwLock<State>,
    hooks: RwLock<HashMap<(usize, Selector), SetterHook>>,
}

impl fmt::Debug for SnapshotRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("SnapshotRuntime")
            .field("objects", &state.objects.len())
            .field("views", &state.views.len())
            .field("hooks", &self.hooks.read().len())
            .finish()
    }
}

impl SnapshotRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加载快照文件
    pub fn load(path: &Path) -> Result<Self, InspectorError> {
        let content = std::fs::read_to_string(path)?;
        let document: SnapshotDocument = serde_json::from_str(&content)?;
        let runtime = Self::from_document(&document)?;

        tracing::info!(
            path = %path.display(),
            objects = document.objects.len(),
            views = document.views.len(),
            "loaded snapshot"
        );
        Ok(runtime)
    }

    /// 保存当前对象图
    pub fn save(&self, path: &Path) -> Result<(), InspectorError> {
        let json = serde_json::to_string_pretty(&self.to_document())?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "saved snapshot");
        Ok(())
    }

    /// 从文档构建：先登记所有对象与可读区域，再解析属性值（值中可能引用其他对象）
    pub fn from_document(document: &SnapshotDocument) -> Result<Self, InspectorError> {
        let runtime = Self::new();

        for object in &document.objects {
            let address = parse_snapshot_address(&object.address)?;
            let superclasses: Vec<&str> = object.superclasses.iter().map(String::as_str).collect();
            runtime.insert_object(address, &object.class, &superclasses);
        }

        // 原始指针的初始值需要可读区域
        for region in &document.regions {
            let start = parse_snapshot_address(&region.start)?;
            runtime.add_readable_region(start, region.size);
        }

        for object in &document.objects {
            let target = ObjectId(parse_snapshot_address(&object.address)?);
            for property in &object.properties {
                runtime.add_property(target, &property.name, &property.attributes, &property.value)?;
                for reader in &property.readers {
                    runtime.add_reader(target, &property.name, reader.clone())?;
                }
            }
        }

        for view in &document.views {
            let address = parse_snapshot_address(&view.address)?;
            runtime.state.write().views.push((ObjectId(address), view.depth));
        }

        Ok(runtime)
    }

    /// 导出存活对象的当前状态
    pub fn to_document(&self) -> SnapshotDocument {
        let state = self.state.read();
        let mut document = SnapshotDocument::default();

        for address in &state.order {
            let Some(object) = state.objects.get(address).filter(|obj| obj.alive) else {
                continue;
            };

            let properties = object
                .properties
                .iter()
                .map(|property| SnapshotProperty {
                    name: property.name.clone(),
                    attributes: property.attributes.clone(),
                    value: object
                        .slots
                        .get(&property.name)
                        .map(|slot| Self::slot_text(&state, slot))
                        .unwrap_or_default(),
                    readers: object.readers.get(&property.name).cloned().unwrap_or_default(),
                })
                .collect();

            document.objects.push(SnapshotObject {
                address: format!("0x{:x}", address),
                class: object.class_name.clone(),
                superclasses: object.superclasses.clone(),
                properties,
            });
        }

        document.views = state
            .views
            .iter()
            .map(|(view, depth)| SnapshotView { address: view.to_string(), depth: *depth })
            .collect();
        document.regions = state
            .regions
            .iter()
            .map(|(start, size)| SnapshotRegion { start: format!("0x{:x}", start), size: *size })
            .collect();

        document
    }

    fn slot_text(state: &State, slot: &PropertySlot) -> String {
        let Some(bytes) = &slot.bytes else {
            return slot.fallback_text.clone();
        };
        layout::read_value(&slot.ty, bytes)
            .ok()
            .map(|value| state.describe_references(value))
            .and_then(|value| editors::format_value(&slot.ty, &value).ok())
            .unwrap_or_else(|| slot.fallback_text.clone())
    }

    /// 登记一个存活对象
    pub fn insert_object(&self, address: usize, class_name: &str, superclasses: &[&str]) -> ObjectId {
        let mut state = self.state.write();
        if !state.objects.contains_key(&address) {
            state.order.push(address);
        }
        state.objects.insert(
            address,
            LiveObject {
                class_name: class_name.to_string(),
                superclasses: superclasses.iter().map(|s| s.to_string()).collect(),
                properties: Vec::new(),
                readers: HashMap::new(),
                slots: HashMap::new(),
                accessors: HashMap::new(),
                alive: true,
            },
        );
        ObjectId(address)
    }

    /// 为对象添加属性及其后备存储
    ///
    /// 类型没有内存布局时只登记元数据与 getter，调用 getter 会得到类型不匹配错误。
    pub fn add_property(
        &self,
        target: ObjectId,
        name: &str,
        attributes: &str,
        initial_text: &str,
    ) -> Result<(), InspectorError> {
        let property = RuntimeProperty::new(name, attributes);
        let descriptor = AttributeDescriptor::from_property(&property);
        let ty = descriptor.resolved_type();

        // 解析期间会读取对象表，不能持有写锁
        let bytes = match ty.size_of() {
            Some(_) if editors::editor_for_type(&ty).is_some() => {
                let value = editors::parse_text(&ty, initial_text, self)?;
                Some(layout::encode_value(&ty, &value).map_err(|e| InspectorError::Snapshot(e.to_string()))?)
            }
            _ => None,
        };

        let mut state = self.state.write();
        let object = state
            .objects
            .get_mut(&target.address())
            .ok_or_else(|| InspectorError::Snapshot(format!("unknown object {}", target)))?;

        object.accessors.insert(descriptor.getter.clone(), Accessor::Getter(name.to_string()));
        if let Some(setter) = &descriptor.setter {
            object.accessors.insert(setter.clone(), Accessor::Setter(name.to_string()));
        }
        object.slots.insert(
            name.to_string(),
            PropertySlot { ty, bytes, fallback_text: initial_text.to_string() },
        );
        object.properties.push(property);

        Ok(())
    }

    /// 添加读取同一属性值的额外 getter
    pub fn add_reader(&self, target: ObjectId, property: &str, reader: Selector) -> Result<(), InspectorError> {
        let mut state = self.state.write();
        let object = state
            .objects
            .get_mut(&target.address())
            .filter(|obj| obj.slots.contains_key(property))
            .ok_or_else(|| InspectorError::Snapshot(format!("unknown property {} on {}", property, target)))?;

        object.accessors.insert(reader.clone(), Accessor::Getter(property.to_string()));
        object.readers.entry(property.to_string()).or_default().push(reader);
        Ok(())
    }

    pub fn add_readable_region(&self, start: usize, size: usize) {
        self.state.write().regions.push((start, size));
    }

    pub fn add_view(&self, view: ObjectId, depth: usize) {
        self.state.write().views.push((view, depth));
    }

    /// 视图层级（视图, 深度）
    pub fn views(&self) -> Vec<(ObjectId, usize)> {
        self.state.read().views.clone()
    }

    /// 按插入顺序列出存活对象
    pub fn objects(&self) -> Vec<ObjectId> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter(|address| state.objects.get(address).is_some_and(|obj| obj.alive))
            .map(|address| ObjectId(*address))
            .collect()
    }

    /// 模拟对象被释放
    pub fn deallocate(&self, target: ObjectId) {
        if let Some(object) = self.state.write().objects.get_mut(&target.address()) {
            object.alive = false;
            tracing::debug!(%target, "object deallocated");
        }
    }

    /// 模拟选择子在运行时缺失
    pub fn remove_selector(&self, target: ObjectId, selector: &Selector) {
        if let Some(object) = self.state.write().objects.get_mut(&target.address()) {
            object.accessors.remove(selector);
        }
    }

    pub fn set_setter_hook(&self, target: ObjectId, setter: Selector, hook: SetterHook) {
        self.hooks.write().insert((target.address(), setter), hook);
    }

    /// 属性存储的原始字节
    pub fn raw_bytes(&self, target: ObjectId, property: &str) -> Option<Vec<u8>> {
        let state = self.state.read();
        state.objects.get(&target.address())?.slots.get(property)?.bytes.clone()
    }

    /// 直接读取属性存储（绕过 getter）
    pub fn stored_value(&self, target: ObjectId, property: &str) -> Option<Value> {
        let state = self.state.read();
        let slot = state.objects.get(&target.address())?.slots.get(property)?;
        let value = layout::read_value(&slot.ty, slot.bytes.as_ref()?).ok()?;
        Some(state.describe_references(value))
    }

    /// 绕过 setter 直接修改存储（模拟外部修改）
    pub fn overwrite_value(&self, target: ObjectId, property: &str, value: &Value) -> Result<(), InspectorError> {
        let mut state = self.state.write();
        let slot = state
            .objects
            .get_mut(&target.address())
            .and_then(|obj| obj.slots.get_mut(property))
            .ok_or_else(|| InspectorError::Snapshot(format!("unknown property {} on {}", property, target)))?;
        let bytes = layout::encode_value(&slot.ty, value).map_err(|e| InspectorError::Snapshot(e.to_string()))?;
        slot.bytes = Some(bytes);
        Ok(())
    }
}

/// 解析快照中的地址（必须是非零的 `0x` 十六进制）
fn parse_snapshot_address(text: &str) -> Result<usize, InspectorError> {
    parse_address_token(text)
        .filter(|address| *address != 0)
        .ok_or_else(|| InspectorError::Snapshot(format!("invalid object address {:?}", text)))
}

fn mismatch(selector: &Selector, reason: impl Into<String>) -> InvocationError {
    InvocationError::TypeMismatch { selector: selector.to_string(), reason: reason.into() }
}

impl AccessorInvoker for SnapshotRuntime {
    fn try_invoke_getter(
        &self,
        target: ObjectId,
        getter: &Selector,
        ty: &TypeClassification,
    ) -> Result<Value, InvocationError> {
        let state = self.state.read();
        let object = state.live_object(target)?;

        let property = match object.accessors.get(getter) {
            Some(Accessor::Getter(property)) => property,
            Some(Accessor::Setter(_)) => return Err(mismatch(getter, "selector takes an argument")),
            None => {
                return Err(InvocationError::SelectorNotFound {
                    target: target.address(),
                    selector: getter.to_string(),
                })
            }
        };

        let slot = object
            .slots
            .get(property)
            .ok_or_else(|| mismatch(getter, "no backing storage"))?;
        if slot.ty != *ty {
            return Err(mismatch(getter, format!("returns {}, expected {}", slot.ty, ty)));
        }
        let bytes = slot
            .bytes
            .as_ref()
            .ok_or_else(|| mismatch(getter, format!("{} has no memory layout", slot.ty)))?;

        let value = layout::read_value(&slot.ty, bytes).map_err(|e| mismatch(getter, e.to_string()))?;
        Ok(state.describe_references(value))
    }

    fn try_invoke_setter(
        &self,
        target: ObjectId,
        setter: &Selector,
        ty: &TypeClassification,
        value: &Value,
    ) -> Result<(), InvocationError> {
        let property = {
            let state = self.state.read();
            let object = state.live_object(target)?;
            let property = match object.accessors.get(setter) {
                Some(Accessor::Setter(property)) => property.clone(),
                Some(Accessor::Getter(_)) => return Err(mismatch(setter, "selector takes no argument")),
                None => {
                    return Err(InvocationError::SelectorNotFound {
                        target: target.address(),
                        selector: setter.to_string(),
                    })
                }
            };
            let slot = object
                .slots
                .get(&property)
                .ok_or_else(|| mismatch(setter, "no backing storage"))?;
            if slot.ty != *ty {
                return Err(mismatch(setter, format!("expects {}, given {}", slot.ty, ty)));
            }
            property
        };

        // 钩子在锁外执行
        let value = match self.hooks.read().get(&(target.address(), setter.clone())) {
            Some(hook) => hook(value.clone())?,
            None => value.clone(),
        };

        if !value.conforms_to(ty) {
            return Err(mismatch(setter, format!("{} value does not fit {}", value.shape_name(), ty)));
        }

        // 先完整编码，再一次性替换，失败时存储保持原样
        let bytes = layout::encode_value(ty, &value).map_err(|e| mismatch(setter, e.to_string()))?;

        let mut state = self.state.write();
        if let Some(address) = state.dangling_reference(&value) {
            return Err(mismatch(setter, format!("0x{:x} is not a live object", address)));
        }
        let object = state
            .objects
            .get_mut(&target.address())
            .filter(|obj| obj.alive)
            .ok_or(InvocationError::TargetDeallocated(target.address()))?;
        let slot = object
            .slots
            .get_mut(&property)
            .ok_or_else(|| mismatch(setter, "no backing storage"))?;
        slot.bytes = Some(bytes);

        tracing::debug!(%target, %setter, "setter invoked");
        Ok(())
    }

    fn responds_to(&self, target: ObjectId, selector: &Selector) -> bool {
        self.state
            .read()
            .live_object(target)
            .is_ok_and(|object| object.accessors.contains_key(selector))
    }
}

impl ReferenceResolver for SnapshotRuntime {
    fn resolve_object(&self, address: usize) -> Option<ObjectRef> {
        self.state.read().resolve(address)
    }

    fn is_kind_of(&self, object: &ObjectRef, class_name: &str) -> bool {
        self.state
            .read()
            .objects
            .get(&object.address)
            .is_some_and(|obj| obj.alive && obj.is_kind_of(class_name))
    }

    fn is_readable_address(&self, address: usize) -> bool {
        let state = self.state.read();
        state.resolve(address).is_some()
            || state
                .regions
                .iter()
                .any(|(start, size)| address >= *start && address - start < *size)
    }
}

impl ObjectRuntime for SnapshotRuntime {
    fn class_name_of(&self, target: ObjectId) -> Option<String> {
        self.state.read().live_object(target).ok().map(|obj| obj.class_name.clone())
    }

    fn property_list(&self, target: ObjectId) -> Result<Vec<RuntimeProperty>, InvocationError> {
        Ok(self.state.read().live_object(target)?.properties.clone())
    }

    fn getter_synonyms(&self, target: ObjectId, property: &str) -> Vec<Selector> {
        self.state
            .read()
            .live_object(target)
            .ok()
            .and_then(|obj| obj.readers.get(property).cloned())
            .unwrap_or_default()
    }
}
