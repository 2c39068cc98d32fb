use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use live_inspector::hierarchy::HierarchyModel;
use live_inspector::utils::{create_backup, init_logging, parse_address_token};
use live_inspector::{InspectorDebugger, ObjectId, PropertyEditor, SnapshotRuntime, SNAPSHOT_EXTENSIONS};

#[derive(Parser)]
#[command(name = "live_inspector")]
#[command(about = "检查并编辑对象快照中的属性")]
#[command(version)]
struct Cli {
    /// 输入快照JSON文件路径
    #[arg(short, long)]
    input: PathBuf,

    /// 目标对象：0x地址或对象序号（默认第一个对象）
    #[arg(short, long)]
    target: Option<String>,

    /// 列出目标的全部属性及可编辑性
    #[arg(long)]
    list: bool,

    /// 将目标的结构dump写入文件
    #[arg(long)]
    dump: Option<PathBuf>,

    /// 设置属性：NAME=TEXT（可重复）
    #[arg(long = "set", value_name = "NAME=TEXT")]
    sets: Vec<String>,

    /// 查看/编辑单个属性
    #[arg(long)]
    property: Option<String>,

    /// 使用同义 getter 读取 --property 指定的属性
    #[arg(long)]
    getter: Option<String>,

    /// 编辑 --property 的结构体字段或数组元素：INDEX=TEXT（可重复）
    #[arg(long = "field", value_name = "INDEX=TEXT")]
    fields: Vec<String>,

    /// 输出快照路径（默认覆盖输入文件）
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 覆盖输入文件时不创建备份
    #[arg(long)]
    no_backup: bool,

    /// 显示视图层级
    #[arg(long)]
    hierarchy: bool,

    /// 静默模式(仅输出错误)
    #[arg(long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    validate_input(&cli.input)?;
    validate_property_options(&cli)?;

    let runtime = SnapshotRuntime::load(&cli.input)
        .with_context(|| format!("加载快照失败: {:?}", cli.input))?;

    if cli.hierarchy {
        print_hierarchy(&runtime);
        return Ok(());
    }

    let target = resolve_target(&runtime, cli.target.as_deref())?;

    if let Some(dump_path) = &cli.dump {
        InspectorDebugger::dump_object(&runtime, target, dump_path)
            .with_context(|| format!("生成dump失败: {:?}", dump_path))?;
        if !cli.quiet {
            println!("对象结构dump已写入: {:?}", dump_path);
        }
    }

    let mut modified = false;
    for assignment in &cli.sets {
        modified |= handle_set(&cli, &runtime, target, assignment)?;
    }
    if let Some(name) = &cli.property {
        modified |= handle_property(&cli, &runtime, target, name)?;
    }

    if modified {
        save_snapshot(&cli, &runtime)?;
    }

    let edited = !cli.sets.is_empty() || cli.property.is_some();
    if cli.list || (cli.dump.is_none() && !edited) {
        print_attributes(&runtime, target)?;
    }

    Ok(())
}

/// 验证输入文件
fn validate_input(input: &Path) -> anyhow::Result<()> {
    if !input.exists() {
        bail!("输入文件不存在: {:?}", input);
    }

    let extension = input
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    if !SNAPSHOT_EXTENSIONS.iter().any(|&ext| Some(ext) == extension.as_deref()) {
        bail!("输入文件必须是JSON快照");
    }

    Ok(())
}

/// --getter 与 --field 需要 --property
fn validate_property_options(cli: &Cli) -> anyhow::Result<()> {
    if cli.property.is_none() && (cli.getter.is_some() || !cli.fields.is_empty()) {
        bail!("--getter 和 --field 需要同时指定 --property");
    }
    Ok(())
}

/// 解析目标对象
fn resolve_target(runtime: &SnapshotRuntime, target: Option<&str>) -> anyhow::Result<ObjectId> {
    let objects = runtime.objects();

    match target {
        Some(text) => {
            if let Some(address) = parse_address_token(text) {
                let id = ObjectId(address);
                if !objects.contains(&id) {
                    bail!("快照中没有存活对象 {}", id);
                }
                return Ok(id);
            }
            let index: usize = text
                .parse()
                .map_err(|_| anyhow!("无效的目标: {} (应为0x地址或序号)", text))?;
            objects
                .get(index)
                .copied()
                .ok_or_else(|| anyhow!("对象序号 {} 超出范围 (共 {} 个对象)", index, objects.len()))
        }
        None => objects.first().copied().ok_or_else(|| anyhow!("快照中没有对象")),
    }
}

/// 处理 --set NAME=TEXT
fn handle_set(cli: &Cli, runtime: &SnapshotRuntime, target: ObjectId, assignment: &str) -> anyhow::Result<bool> {
    let (name, text) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("--set 格式应为 NAME=TEXT: {}", assignment))?;
    let name = name.trim();

    let mut editor = PropertyEditor::for_name(runtime, target, name)
        .with_context(|| format!("无法编辑属性 {}", name))?;
    editor.load().with_context(|| format!("读取属性 {} 失败", name))?;
    let before = editor.text().to_string();

    editor.begin_edit(text)?;
    editor.commit().with_context(|| format!("设置属性 {} 失败", name))?;

    if !cli.quiet {
        println!("{}: {} -> {}", name, before, editor.text());
    }
    Ok(true)
}

/// 处理 --property（可配合 --getter / --field）
fn handle_property(cli: &Cli, runtime: &SnapshotRuntime, target: ObjectId, name: &str) -> anyhow::Result<bool> {
    let mut editor = PropertyEditor::for_name(runtime, target, name)
        .with_context(|| format!("无法编辑属性 {}", name))?;
    editor.load().with_context(|| format!("读取属性 {} 失败", name))?;

    if let Some(getter) = &cli.getter {
        let index = editor
            .available_getters()
            .iter()
            .position(|g| g.name() == getter)
            .ok_or_else(|| {
                let names: Vec<&str> = editor.available_getters().iter().map(|g| g.name()).collect();
                anyhow!("属性 {} 没有 getter {} (可用: {})", name, getter, names.join(", "))
            })?;
        editor.select_getter(index)?;
    }

    if !cli.quiet {
        println!("{} [{}]", name, editor.title_for_getter_button());
        println!("  类型: {}", editor.resolved_type());
        println!("  当前值: {}", editor.text());
    }

    if cli.fields.is_empty() {
        return Ok(false);
    }

    for field in &cli.fields {
        let (index, text) = field
            .split_once('=')
            .ok_or_else(|| anyhow!("--field 格式应为 INDEX=TEXT: {}", field))?;
        let index: usize = index
            .trim()
            .parse()
            .map_err(|_| anyhow!("无效的字段序号: {}", index))?;
        editor.begin_edit_component(index, text)?;
    }
    editor.commit().with_context(|| format!("设置属性 {} 失败", name))?;

    if !cli.quiet {
        println!("  新值: {}", editor.text());
    }
    Ok(true)
}

/// 保存修改后的快照
fn save_snapshot(cli: &Cli, runtime: &SnapshotRuntime) -> anyhow::Result<()> {
    let output_path = cli.output.clone().unwrap_or_else(|| cli.input.clone());

    if output_path == cli.input && !cli.no_backup {
        let backup = create_backup(&cli.input)?;
        if !cli.quiet {
            println!("已创建备份: {:?}", backup);
        }
    }

    runtime
        .save(&output_path)
        .with_context(|| format!("写入快照失败: {:?}", output_path))?;

    if !cli.quiet {
        println!("快照已写入: {:?}", output_path);
    }
    Ok(())
}

/// 打印属性列表
fn print_attributes(runtime: &SnapshotRuntime, target: ObjectId) -> anyhow::Result<()> {
    let summaries = InspectorDebugger::summarize(runtime, target)?;

    println!("对象 {} 共 {} 个属性:", target, summaries.len());
    for summary in &summaries {
        let value = match &summary.value {
            Ok(text) => text.clone(),
            Err(reason) => format!("<{}>", reason),
        };
        println!(
            "  {} ({}) [{}] = {}",
            summary.descriptor.name, summary.type_name, summary.editability, value
        );
    }
    Ok(())
}

/// 打印视图层级
fn print_hierarchy(runtime: &SnapshotRuntime) {
    let model = HierarchyModel::from_snapshot(runtime, Vec::new(), None);
    let rows = model.rows();

    if rows.is_empty() {
        println!("快照中没有视图层级");
        return;
    }
    for row in rows {
        println!("{}", row.indented_title());
    }
}
