use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::editors;
use crate::policy::{self, Editability};
use crate::property::{AttributeDescriptor, PropertyAttributes};
use crate::runtime::{ObjectId, ObjectRuntime};
use crate::utils::InspectorError;

/// 单个属性的检查结果
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSummary {
    pub descriptor: AttributeDescriptor,
    pub attributes: PropertyAttributes,
    /// 类型的可读名称
    pub type_name: String,
    pub editability: Editability,
    /// 当前值文本，读取失败时为错误信息
    pub value: Result<String, String>,
}

/// 对象结构调试器
pub struct InspectorDebugger;

impl InspectorDebugger {
    /// 检查目标的全部属性
    pub fn summarize<R: ObjectRuntime>(runtime: &R, target: ObjectId) -> Result<Vec<AttributeSummary>, InspectorError> {
        let properties = runtime.property_list(target)?;

        Ok(properties
            .iter()
            .map(|property| {
                let attributes = PropertyAttributes::parse(&property.attributes);
                let descriptor = AttributeDescriptor::from_attributes(&property.name, &attributes);
                let ty = descriptor.resolved_type();
                let editability = policy::classify(&descriptor, &ty);

                // 只读属性同样读取显示；没有编辑器的类型无法格式化
                let value = if policy::has_editor(&ty) {
                    runtime
                        .try_invoke_getter(target, &descriptor.getter, &ty)
                        .map_err(|e| e.to_string())
                        .and_then(|v| editors::format_value(&ty, &v).map_err(|e| e.to_string()))
                } else {
                    Err("无法显示".to_string())
                };

                AttributeSummary {
                    type_name: ty.to_string(),
                    descriptor,
                    attributes,
                    editability,
                    value,
                }
            })
            .collect())
    }

    /// 生成对象结构dump文件
    pub fn dump_object<R: ObjectRuntime>(runtime: &R, target: ObjectId, output_path: &Path) -> Result<(), InspectorError> {
        let mut output = File::create(output_path)?;
        Self::write_object_dump(runtime, target, &mut output)?;
        tracing::info!(path = %output_path.display(), %target, "wrote object dump");
        Ok(())
    }

    /// 写入对象结构dump
    pub fn write_object_dump<R: ObjectRuntime, W: Write>(
        runtime: &R,
        target: ObjectId,
        output: &mut W,
    ) -> Result<(), InspectorError> {
        let summaries = Self::summarize(runtime, target)?;
        let class_name = runtime.class_name_of(target).unwrap_or_else(|| "?".to_string());

        writeln!(output, "=== 对象结构dump ===")?;
        writeln!(output, "对象: {}", target)?;
        writeln!(output, "类: {}", class_name)?;
        writeln!(output, "属性数: {}", summaries.len())?;
        writeln!(output)?;

        for summary in &summaries {
            Self::dump_attribute(runtime, target, summary, output)?;
        }

        let editable = summaries.iter().filter(|s| s.editability.is_editable()).count();
        writeln!(output, "可编辑: {} / {}", editable, summaries.len())?;
        Ok(())
    }

    /// Dump 单个属性
    fn dump_attribute<R: ObjectRuntime, W: Write>(
        runtime: &R,
        target: ObjectId,
        summary: &AttributeSummary,
        output: &mut W,
    ) -> Result<(), InspectorError> {
        let descriptor = &summary.descriptor;

        writeln!(output, "{} {{", descriptor.name)?;
        writeln!(output, "  类型: {}", summary.type_name)?;
        writeln!(output, "  编码: {:?}", descriptor.type_encoding)?;
        writeln!(
            output,
            "  访问器: {} / {}",
            descriptor.getter,
            descriptor.setter.as_ref().map(|s| s.name()).unwrap_or("-")
        )?;
        if !summary.attributes.flags.is_empty() {
            writeln!(output, "  标志位: {:?}", summary.attributes.flags)?;
        }
        if let Some(ivar) = &summary.attributes.ivar {
            writeln!(output, "  实例变量: {}", ivar)?;
        }
        writeln!(output, "  可编辑性: {}", summary.editability)?;

        match &summary.value {
            Ok(text) => writeln!(output, "  当前值: {}", text)?,
            Err(reason) => writeln!(output, "  ⚠ 读取失败: {}", reason)?,
        }

        let synonyms = runtime.getter_synonyms(target, &descriptor.name);
        if !synonyms.is_empty() {
            let names: Vec<&str> = synonyms.iter().map(|s| s.name()).collect();
            writeln!(output, "  同义 getter: {}", names.join(", "))?;
        }

        writeln!(output, "}}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::EditorKind;
    use crate::runtime::{Selector, SnapshotRuntime};

    fn runtime() -> (SnapshotRuntime, ObjectId) {
        let runtime = SnapshotRuntime::new();
        let target = runtime.insert_object(0x1000, "Counter", &[]);
        runtime.add_property(target, "count", "Tq,N,V_count", "5").unwrap();
        runtime.add_property(target, "hash", "TQ,R", "7").unwrap();
        runtime.add_property(target, "handler", "T@?,C,N", "<block>").unwrap();
        runtime.add_reader(target, "count", Selector::new("currentCount")).unwrap();
        (runtime, target)
    }

    #[test]
    fn test_summarize() {
        let (runtime, target) = runtime();
        let summaries = InspectorDebugger::summarize(&runtime, target).unwrap();
        assert_eq!(summaries.len(), 3);

        assert_eq!(summaries[0].editability, Editability::Editable(EditorKind::Integer));
        assert_eq!(summaries[0].value, Ok("5".to_string()));
        assert_eq!(summaries[1].editability, Editability::ReadOnly);
        assert_eq!(summaries[1].value, Ok("7".to_string()));
        assert_eq!(summaries[2].editability, Editability::Unsupported);
        assert!(summaries[2].value.is_err());
    }

    #[test]
    fn test_write_dump() {
        let (runtime, target) = runtime();
        let mut buffer = Vec::new();
        InspectorDebugger::write_object_dump(&runtime, target, &mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("类: Counter"));
        assert!(text.contains("访问器: count / setCount:"));
        assert!(text.contains("访问器: hash / -"));
        assert!(text.contains("同义 getter: currentCount"));
        assert!(text.contains("可编辑: 1 / 3"));
    }

    #[test]
    fn test_dump_dead_object() {
        let (runtime, target) = runtime();
        runtime.deallocate(target);
        let mut buffer = Vec::new();
        assert!(InspectorDebugger::write_object_dump(&runtime, target, &mut buffer).is_err());
    }
}
