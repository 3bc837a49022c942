//! WebGL-style GLSL to Vulkan GLSL 450 adaptation.
//!
//! User shaders are written against the browser dialect: loose `uniform`
//! declarations, `attribute`/`varying`, `gl_FragColor`, `texture2D`. naga only
//! accepts the Vulkan flavour, so each stage is rewritten line by line before
//! it reaches the device:
//!
//! 1. `#version`, `#extension` and `precision` lines are blanked so reported
//!    line numbers still match the author's source.
//! 2. Contract uniforms (`u_Time`, `u_Mouse`, `colors`, `renderMode`,
//!    `resolution`) are removed and re-exposed through [`FRAME_BLOCK`] with
//!    `#define` aliases that keep the declared type. Anything else declared
//!    `uniform` becomes a zeroed private global.
//! 3. `attribute` and `varying` gain explicit locations. Varyings are matched
//!    across stages by name.
//! 4. The fragment stage writes through an aliased `out vec4` and sees
//!    `gl_FragCoord` with a bottom-left origin.

use std::borrow::Cow;
use std::fmt;

use wgpu::naga::front::glsl;
use wgpu::naga::ShaderStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    fn naga(self) -> ShaderStage {
        match self {
            Stage::Vertex => ShaderStage::Vertex,
            Stage::Fragment => ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProgramError {
    #[error("{stage} shader failed to compile:\n{message}")]
    Compile { stage: Stage, message: String },
    #[error("shader program failed to link: {0}")]
    Link(String),
}

impl ProgramError {
    fn compile(stage: Stage, message: impl Into<String>) -> Self {
        ProgramError::Compile {
            stage,
            message: message.into(),
        }
    }
}

/// Names the renderer feeds every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractUniform {
    Time,
    Pointer,
    Palette,
    RenderMode,
    Resolution,
}

impl ContractUniform {
    pub const ALL: [ContractUniform; 5] = [
        ContractUniform::Time,
        ContractUniform::Pointer,
        ContractUniform::Palette,
        ContractUniform::RenderMode,
        ContractUniform::Resolution,
    ];

    pub fn glsl_name(self) -> &'static str {
        match self {
            ContractUniform::Time => "u_Time",
            ContractUniform::Pointer => "u_Mouse",
            ContractUniform::Palette => "colors",
            ContractUniform::RenderMode => "renderMode",
            ContractUniform::Resolution => "resolution",
        }
    }

    fn from_glsl_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|uniform| uniform.glsl_name() == name)
    }

    fn accepts(self, ty: UniformType) -> bool {
        use UniformType::*;
        match self {
            ContractUniform::Time => ty == Float,
            ContractUniform::Pointer => ty == Vec2,
            ContractUniform::Palette => ty == Sampler2D,
            ContractUniform::RenderMode => matches!(ty, Bool | Int | Float),
            ContractUniform::Resolution => matches!(ty, Int | Float),
        }
    }

    fn expected(self) -> &'static str {
        match self {
            ContractUniform::Time => "float",
            ContractUniform::Pointer => "vec2",
            ContractUniform::Palette => "sampler2D",
            ContractUniform::RenderMode => "bool, int or float",
            ContractUniform::Resolution => "float or int",
        }
    }

    /// Expression the uniform name expands to, cast back to the declared type.
    fn alias(self, ty: UniformType) -> &'static str {
        match (self, ty) {
            (ContractUniform::Time, _) => "hf_frame.hf_time",
            (ContractUniform::Pointer, _) => "hf_frame.hf_pointer",
            (ContractUniform::Palette, _) => {
                "sampler2D(hf_palette_texture, hf_palette_sampler)"
            }
            (ContractUniform::RenderMode, UniformType::Bool) => "(hf_frame.hf_render_mode != 0)",
            (ContractUniform::RenderMode, UniformType::Float) => {
                "float(hf_frame.hf_render_mode)"
            }
            (ContractUniform::RenderMode, _) => "hf_frame.hf_render_mode",
            (ContractUniform::Resolution, UniformType::Int) => "int(hf_frame.hf_resolution)",
            (ContractUniform::Resolution, _) => "hf_frame.hf_resolution",
        }
    }

    fn index(self) -> usize {
        match self {
            ContractUniform::Time => 0,
            ContractUniform::Pointer => 1,
            ContractUniform::Palette => 2,
            ContractUniform::RenderMode => 3,
            ContractUniform::Resolution => 4,
        }
    }
}

/// GLSL types a contract uniform may be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Bool,
    Int,
    Float,
    Vec2,
    Sampler2D,
}

impl UniformType {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "bool" => Some(UniformType::Bool),
            "int" => Some(UniformType::Int),
            "float" => Some(UniformType::Float),
            "vec2" => Some(UniformType::Vec2),
            "sampler2D" => Some(UniformType::Sampler2D),
            _ => None,
        }
    }
}

/// Contract uniforms a program declared, across both stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeclaredUniforms {
    types: [Option<UniformType>; 5],
}

impl DeclaredUniforms {
    pub fn get(&self, uniform: ContractUniform) -> Option<UniformType> {
        self.types[uniform.index()]
    }

    pub fn contains(&self, uniform: ContractUniform) -> bool {
        self.get(uniform).is_some()
    }

    fn record(&mut self, uniform: ContractUniform, ty: UniformType) -> Result<(), ProgramError> {
        let slot = &mut self.types[uniform.index()];
        match *slot {
            Some(existing) if existing != ty => Err(ProgramError::Link(format!(
                "`{}` declared as {existing:?} and {ty:?} in different stages",
                uniform.glsl_name()
            ))),
            _ => {
                *slot = Some(ty);
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptedStage {
    pub stage: Stage,
    pub source: String,
}

impl AdaptedStage {
    /// Parses the adapted source with naga's GLSL frontend.
    pub fn validate(&self) -> Result<(), ProgramError> {
        let mut frontend = glsl::Frontend::default();
        let options = glsl::Options::from(self.stage.naga());
        frontend
            .parse(&options, &self.source)
            .map(|_| ())
            .map_err(|errors| ProgramError::compile(self.stage, errors.emit_to_string(&self.source)))
    }

    pub(crate) fn create_module(&self, device: &wgpu::Device) -> wgpu::ShaderModule {
        let label = match self.stage {
            Stage::Vertex => "huefield vertex",
            Stage::Fragment => "huefield fragment",
        };
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Owned(self.source.clone()),
                stage: self.stage.naga(),
                defines: &[],
            },
        })
    }
}

/// Both stages rewritten, plus what the pipeline needs to know about them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptedProgram {
    pub vertex: AdaptedStage,
    pub fragment: AdaptedStage,
    pub declared: DeclaredUniforms,
    /// Location assigned to `a_position`, fed from the quad buffer.
    pub position_location: Option<u32>,
}

pub const POSITION_ATTRIBUTE: &str = "a_position";

/// Rewrites both stages and checks that they parse.
pub fn adapt_program(vertex: &str, fragment: &str) -> Result<AdaptedProgram, ProgramError> {
    let mut declared = DeclaredUniforms::default();
    let mut varyings = Vec::new();

    let vertex_body = rewrite_stage(Stage::Vertex, vertex, &mut declared, &mut varyings)?;
    let fragment_body = rewrite_stage(Stage::Fragment, fragment, &mut declared, &mut varyings)?;

    let position_location = vertex_body
        .attributes
        .iter()
        .position(|name| name == POSITION_ATTRIBUTE)
        .map(|index| index as u32);

    let program = AdaptedProgram {
        vertex: AdaptedStage {
            stage: Stage::Vertex,
            source: assemble(Stage::Vertex, &vertex_body, &declared),
        },
        fragment: AdaptedStage {
            stage: Stage::Fragment,
            source: assemble(Stage::Fragment, &fragment_body, &declared),
        },
        declared,
        position_location,
    };
    program.vertex.validate()?;
    program.fragment.validate()?;
    Ok(program)
}

struct StageBody {
    lines: Vec<String>,
    attributes: Vec<String>,
    declared_here: Vec<ContractUniform>,
    writes_frag_color: bool,
}

const PRECISION_QUALIFIERS: [&str; 3] = ["lowp", "mediump", "highp"];

struct Declaration<'a> {
    ty: &'a str,
    names: Vec<String>,
}

/// Splits `keyword [precision] type name[, name...];` into its parts.
fn parse_declaration<'a>(code: &'a str, keyword: &str) -> Option<Declaration<'a>> {
    let rest = code.strip_prefix(keyword)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim().strip_suffix(';')?.trim_end();
    let mut tokens = rest
        .split_whitespace()
        .filter(|token| !PRECISION_QUALIFIERS.contains(token));
    let ty = tokens.next()?;
    let names = tokens
        .collect::<String>()
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    if names.is_empty() {
        return None;
    }
    Some(Declaration { ty, names })
}

fn code_portion(line: &str) -> &str {
    let code = match line.find("//") {
        Some(index) => &line[..index],
        None => line,
    };
    code.trim()
}

fn rewrite_stage(
    stage: Stage,
    source: &str,
    declared: &mut DeclaredUniforms,
    varyings: &mut Vec<String>,
) -> Result<StageBody, ProgramError> {
    let mut body = StageBody {
        lines: Vec::new(),
        attributes: Vec::new(),
        declared_here: Vec::new(),
        writes_frag_color: false,
    };

    for line in source.lines() {
        let code = code_portion(line);

        if code.starts_with("#version")
            || code.starts_with("#extension")
            || code.starts_with("precision ")
        {
            body.lines.push(String::new());
            continue;
        }

        let (statements, rest) = split_declarations(code);
        if !statements.is_empty() {
            let mut pieces = Vec::new();
            for statement in statements {
                match rewrite_declaration(stage, statement, declared, varyings, &mut body)? {
                    Some(replacement) => pieces.push(replacement),
                    None => pieces.push(statement.to_string()),
                }
            }
            if !rest.is_empty() {
                body.writes_frag_color |= rest.contains("gl_FragColor");
                pieces.push(rest.to_string());
            }
            body.lines.push(pieces.join(" "));
            continue;
        }

        if code.contains("gl_FragColor") {
            body.writes_frag_color = true;
        }
        body.lines.push(line.to_string());
    }

    Ok(body)
}

const DECLARATION_KEYWORDS: [&str; 3] = ["uniform", "attribute", "varying"];

fn starts_with_keyword(code: &str, keyword: &str) -> bool {
    code.strip_prefix(keyword)
        .is_some_and(|rest| rest.starts_with(char::is_whitespace))
}

/// Peels the leading `uniform`/`attribute`/`varying` statements off a line.
/// Whatever follows the first other statement is returned untouched.
fn split_declarations(code: &str) -> (Vec<&str>, &str) {
    let mut statements = Vec::new();
    let mut rest = code;
    while let Some(end) = rest.find(';') {
        let statement = rest[..=end].trim();
        if !DECLARATION_KEYWORDS
            .iter()
            .any(|keyword| starts_with_keyword(statement, keyword))
        {
            break;
        }
        statements.push(statement);
        rest = rest[end + 1..].trim_start();
    }
    (statements, rest)
}

/// Rewrites one declaration statement, or `None` if it is not one the
/// adapter understands.
fn rewrite_declaration(
    stage: Stage,
    statement: &str,
    declared: &mut DeclaredUniforms,
    varyings: &mut Vec<String>,
    body: &mut StageBody,
) -> Result<Option<String>, ProgramError> {
    if let Some(declaration) = parse_declaration(statement, "uniform") {
        return rewrite_uniform(stage, &declaration, declared, body).map(Some);
    }

    if let Some(declaration) = parse_declaration(statement, "attribute") {
        if stage == Stage::Fragment {
            return Err(ProgramError::compile(
                stage,
                "`attribute` is only valid in the vertex stage",
            ));
        }
        let mut rewritten = Vec::new();
        for name in declaration.names {
            let location = body.attributes.len();
            rewritten.push(format!(
                "layout(location = {location}) in {} {name};",
                declaration.ty
            ));
            body.attributes.push(name);
        }
        return Ok(Some(rewritten.join(" ")));
    }

    if let Some(declaration) = parse_declaration(statement, "varying") {
        let mut rewritten = Vec::new();
        for name in declaration.names {
            let location = match stage {
                Stage::Vertex => {
                    varyings.push(name.clone());
                    varyings.len() - 1
                }
                Stage::Fragment => varyings
                    .iter()
                    .position(|existing| *existing == name)
                    .ok_or_else(|| {
                        ProgramError::Link(format!(
                            "varying `{name}` is read by the fragment stage but never written by the vertex stage"
                        ))
                    })?,
            };
            let direction = match stage {
                Stage::Vertex => "out",
                Stage::Fragment => "in",
            };
            rewritten.push(format!(
                "layout(location = {location}) {direction} {} {name};",
                declaration.ty
            ));
        }
        return Ok(Some(rewritten.join(" ")));
    }

    Ok(None)
}

fn rewrite_uniform(
    stage: Stage,
    declaration: &Declaration<'_>,
    declared: &mut DeclaredUniforms,
    body: &mut StageBody,
) -> Result<String, ProgramError> {
    let mut privates = Vec::new();
    for name in &declaration.names {
        let base = name.split('[').next().unwrap_or(name).trim();
        if let Some(uniform) = ContractUniform::from_glsl_name(base) {
            let ty = UniformType::parse(declaration.ty)
                .filter(|ty| uniform.accepts(*ty) && !name.contains('['))
                .ok_or_else(|| {
                    ProgramError::compile(
                        stage,
                        format!(
                            "`{name}` declared as {}; expected {}",
                            declaration.ty,
                            uniform.expected()
                        ),
                    )
                })?;
            declared.record(uniform, ty)?;
            if !body.declared_here.contains(&uniform) {
                body.declared_here.push(uniform);
            }
            continue;
        }

        if declaration.ty.starts_with("sampler") {
            return Err(ProgramError::compile(
                stage,
                format!("sampler uniform `{name}` has no texture bound; only `colors` is supplied"),
            ));
        }
        tracing::warn!(%stage, uniform = %name, "uniform is not fed by the renderer; binding it to zero");
        if name.contains('[') {
            privates.push(format!("{} {name};", declaration.ty));
        } else {
            privates.push(format!("{ty} {name} = {ty}(0);", ty = declaration.ty));
        }
    }
    Ok(privates.join(" "))
}

/// Uniform block shared by both stages. Layout must match `FrameUniforms`.
pub const FRAME_BLOCK: &str = r"layout(std140, set = 0, binding = 0) uniform HuefieldFrame {
    vec2 hf_pointer;
    float hf_time;
    float hf_resolution;
    vec2 hf_viewport;
    int hf_render_mode;
    float hf_padding;
} hf_frame;
";

const PALETTE_BINDINGS: &str = r"layout(set = 1, binding = 0) uniform texture2D hf_palette_texture;
layout(set = 1, binding = 1) uniform sampler hf_palette_sampler;
";

const FRAGMENT_PRELUDE: &str = r"vec4 hf_frag_coord;
#define gl_FragCoord hf_frag_coord
#define main hf_user_main
";

const FRAG_COLOR_OUTPUT: &str = r"layout(location = 0) out vec4 hf_frag_color;
#define gl_FragColor hf_frag_color
";

/// Restores a real `main` that flips `gl_FragCoord` to a bottom-left origin
/// before handing over to the author's entry point.
const FRAGMENT_FOOTER: &str = r"
#undef main
void main() {
#undef gl_FragCoord
    vec4 hf_builtin_coord = gl_FragCoord;
#define gl_FragCoord hf_frag_coord
    hf_frag_coord = vec4(hf_builtin_coord.x, hf_frame.hf_viewport.y - hf_builtin_coord.y, hf_builtin_coord.z, hf_builtin_coord.w);
    hf_user_main();
}
";

fn assemble(stage: Stage, body: &StageBody, declared: &DeclaredUniforms) -> String {
    let mut source = String::from("#version 450\n");
    source.push_str(FRAME_BLOCK);

    for uniform in &body.declared_here {
        if *uniform == ContractUniform::Palette {
            source.push_str(PALETTE_BINDINGS);
        }
    }
    for uniform in &body.declared_here {
        if let Some(ty) = declared.get(*uniform) {
            source.push_str(&format!("#define {} {}\n", uniform.glsl_name(), uniform.alias(ty)));
        }
    }
    source.push_str("#define texture2D texture\n");

    if stage == Stage::Fragment {
        if body.writes_frag_color {
            source.push_str(FRAG_COLOR_OUTPUT);
        }
        source.push_str(FRAGMENT_PRELUDE);
    }

    source.push_str("#line 1\n");
    for line in &body.lines {
        source.push_str(line);
        source.push('\n');
    }

    if stage == Stage::Fragment {
        source.push_str(FRAGMENT_FOOTER);
    }
    source
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin;

    const VERTEX: &str = r"
attribute vec2 a_position;
varying vec2 v_uv;
void main() {
    v_uv = a_position * 0.5 + vec2(0.5);
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

    #[test]
    fn builtin_program_adapts_and_parses() {
        let program = adapt_program(builtin::VERTEX_SHADER, builtin::FRAGMENT_SHADER)
            .expect("builtin shaders should adapt");
        assert_eq!(program.position_location, Some(0));
        for uniform in ContractUniform::ALL {
            assert!(program.declared.contains(uniform), "{uniform:?} missing");
        }
        assert_eq!(
            program.declared.get(ContractUniform::RenderMode),
            Some(UniformType::Bool)
        );
    }

    #[test]
    fn contract_uniforms_become_block_aliases() {
        let fragment = r"
precision mediump float;
uniform float u_Time;
uniform bool renderMode;
varying vec2 v_uv;
void main() {
    float shade = renderMode ? u_Time : 0.0;
    gl_FragColor = vec4(v_uv, shade, 1.0);
}
";
        let program = adapt_program(VERTEX, fragment).expect("adapt");
        let source = &program.fragment.source;
        assert!(!source.contains("uniform float u_Time"));
        assert!(!source.contains("precision mediump"));
        assert!(source.contains("#define u_Time hf_frame.hf_time"));
        assert!(source.contains("#define renderMode (hf_frame.hf_render_mode != 0)"));
        assert!(source.contains("layout(location = 0) in vec2 v_uv;"));
        assert!(source.contains("#define gl_FragColor hf_frag_color"));
        assert!(!program.declared.contains(ContractUniform::Pointer));
        assert!(!program.declared.contains(ContractUniform::Palette));
    }

    #[test]
    fn render_mode_keeps_declared_integer_type() {
        let fragment = r"
uniform int renderMode;
void main() {
    gl_FragColor = vec4(float(renderMode));
}
";
        let program = adapt_program(VERTEX, fragment).expect("adapt");
        assert_eq!(
            program.declared.get(ContractUniform::RenderMode),
            Some(UniformType::Int)
        );
        assert!(program
            .fragment
            .source
            .contains("#define renderMode hf_frame.hf_render_mode\n"));
    }

    #[test]
    fn wrong_contract_type_is_a_compile_error() {
        let fragment = r"
uniform vec3 u_Mouse;
void main() { gl_FragColor = vec4(u_Mouse, 1.0); }
";
        let err = adapt_program(VERTEX, fragment).unwrap_err();
        assert!(matches!(
            err,
            ProgramError::Compile {
                stage: Stage::Fragment,
                ..
            }
        ));
    }

    #[test]
    fn unmatched_varying_is_a_link_error() {
        let fragment = r"
varying vec3 v_normal;
void main() { gl_FragColor = vec4(v_normal, 1.0); }
";
        let err = adapt_program(VERTEX, fragment).unwrap_err();
        assert!(matches!(err, ProgramError::Link(_)));
    }

    #[test]
    fn syntax_error_reports_stage() {
        let fragment = r"
void main() {
    gl_FragColor = vec4(1.0
}
";
        match adapt_program(VERTEX, fragment) {
            Err(ProgramError::Compile { stage, message }) => {
                assert_eq!(stage, Stage::Fragment);
                assert!(!message.is_empty());
            }
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_uniforms_become_zeroed_globals() {
        let fragment = r"
uniform float u_Extra; // not supplied
void main() { gl_FragColor = vec4(u_Extra); }
";
        let program = adapt_program(VERTEX, fragment).expect("adapt");
        assert!(program
            .fragment
            .source
            .contains("float u_Extra = float(0);"));
    }

    #[test]
    fn declaration_parser_handles_qualifiers_and_lists() {
        let declaration = parse_declaration("uniform highp float a, b;", "uniform").unwrap();
        assert_eq!(declaration.ty, "float");
        assert_eq!(declaration.names, vec!["a".to_string(), "b".to_string()]);
        assert!(parse_declaration("uniforms float a;", "uniform").is_none());
        assert!(parse_declaration("uniform float a", "uniform").is_none());
    }

    #[test]
    fn several_declarations_on_one_line_are_split() {
        let fragment = r"
uniform float u_Time; uniform vec2 u_Mouse; varying vec2 v_uv;
void main() { gl_FragColor = vec4(v_uv * u_Mouse, u_Time, 1.0); }
";
        let program = adapt_program(VERTEX, fragment).expect("adapt");
        assert!(program.declared.contains(ContractUniform::Time));
        assert!(program.declared.contains(ContractUniform::Pointer));
        let source = &program.fragment.source;
        assert!(!source.contains("uniform float u_Time"));
        assert!(source.contains("#define u_Mouse hf_frame.hf_pointer"));
        assert!(source.contains("layout(location = 0) in vec2 v_uv;"));
    }

    #[test]
    fn trailing_code_after_declarations_is_kept() {
        let (statements, rest) =
            split_declarations("uniform float a; varying vec2 b; float c = 1.0; uniform int d;");
        assert_eq!(statements, vec!["uniform float a;", "varying vec2 b;"]);
        assert_eq!(rest, "float c = 1.0; uniform int d;");

        let (statements, rest) = split_declarations("void main() { x = 1.0; }");
        assert!(statements.is_empty());
        assert_eq!(rest, "void main() { x = 1.0; }");
    }
}
