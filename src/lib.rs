/*!
Compiler for the Effect FX shading language.

Effect FX is an HLSL-style language extended with *techniques* and *passes*
that describe complete render pipeline configurations next to the shader
code itself. This crate consumes a classified token stream (the lexer and
preprocessor are host concerns) and produces a [`Module`]: a SPIR-V binary
containing one entry point per referenced shader function, together with the
technique, texture, sampler and uniform metadata the host renderer needs to
drive it.

The front end under [`front::fx`] performs name resolution, type checking,
implicit conversions, overload resolution and constant folding while
directly emitting structured SSA code through the SPIR-V builder. There is
no intermediate AST; expressions are carried as access chains (a base id
plus a path of member/index/swizzle operations) and only materialized into
loads and stores when a value is actually required.
*/

#![allow(clippy::new_without_default)]

mod back;
pub mod front;

pub use front::fx::token::{SourceLocation, Token, TokenValue};
pub use front::fx::{Error, Frontend, Options, ParseErrors};

use std::hash::BuildHasherDefault;

/// Hash map that does not use a cryptographically strong hasher, since the
/// compiler never hashes attacker-controlled keys across trust boundaries.
pub type FastHashMap<K, T> = rustc_hash::FxHashMap<K, T>;
/// Hash set counterpart of [`FastHashMap`].
pub type FastHashSet<K> = rustc_hash::FxHashSet<K>;
/// Insertion-ordered set, for collections that end up in the module in a
/// deterministic order.
pub type FastIndexSet<K> = indexmap::IndexSet<K, BuildHasherDefault<rustc_hash::FxHasher>>;

/// Pipeline stage an entry point executes in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// The scalar class of a [`Type`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BaseType {
    #[default]
    Void,
    Bool,
    Int,
    Uint,
    Float,
    String,
    Struct,
    Texture,
    Sampler,
    Function,
}

bitflags::bitflags! {
    /// Storage, parameter and interpolation qualifiers attached to a type.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Qualifiers: u32 {
        const EXTERN = 1 << 0;
        const STATIC = 1 << 1;
        const UNIFORM = 1 << 2;
        const VOLATILE = 1 << 3;
        const PRECISE = 1 << 4;
        const IN = 1 << 5;
        const OUT = 1 << 6;
        const CONST = 1 << 7;
        const LINEAR = 1 << 8;
        const NOPERSPECTIVE = 1 << 9;
        const CENTROID = 1 << 10;
        const NOINTERPOLATION = 1 << 11;
        const INOUT = Self::IN.bits() | Self::OUT.bits();
    }
}

/// Structural type descriptor.
///
/// Scalars have `rows == cols == 1`, vectors have `cols == 1` and `rows > 1`,
/// matrices have both dimensions in `2..=4`. Textures, samplers and strings
/// carry zero dimensions. `array_length` is `0` for non-arrays, `-1` for
/// unsized arrays and the element count otherwise. For structs and functions
/// `definition` holds the SPIR-V id of the defining instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Type {
    pub base: BaseType,
    pub rows: u32,
    pub cols: u32,
    pub array_length: i32,
    pub qualifiers: Qualifiers,
    pub is_pointer: bool,
    pub is_input: bool,
    pub is_output: bool,
    pub definition: u32,
}

impl Type {
    pub const VOID: Self = Self::new(BaseType::Void, 0, 0);
    pub const BOOL: Self = Self::new(BaseType::Bool, 1, 1);
    pub const INT: Self = Self::new(BaseType::Int, 1, 1);
    pub const UINT: Self = Self::new(BaseType::Uint, 1, 1);
    pub const FLOAT: Self = Self::new(BaseType::Float, 1, 1);
    pub const STRING: Self = Self::new(BaseType::String, 0, 0);
    pub const TEXTURE: Self = Self::new(BaseType::Texture, 0, 0);
    pub const SAMPLER: Self = Self::new(BaseType::Sampler, 0, 0);
    pub const FUNCTION: Self = Self::new(BaseType::Function, 0, 0);

    pub const fn new(base: BaseType, rows: u32, cols: u32) -> Self {
        Type {
            base,
            rows,
            cols,
            array_length: 0,
            qualifiers: Qualifiers::empty(),
            is_pointer: false,
            is_input: false,
            is_output: false,
            definition: 0,
        }
    }

    pub const fn scalar(base: BaseType) -> Self {
        Self::new(base, 1, 1)
    }

    pub const fn vector(base: BaseType, rows: u32) -> Self {
        Self::new(base, rows, 1)
    }

    pub const fn matrix(base: BaseType, rows: u32, cols: u32) -> Self {
        Self::new(base, rows, cols)
    }

    pub fn with_qualifiers(mut self, qualifiers: Qualifiers) -> Self {
        self.qualifiers = qualifiers;
        self
    }

    pub fn has(&self, qualifier: Qualifiers) -> bool {
        self.qualifiers.contains(qualifier)
    }

    pub const fn is_void(&self) -> bool {
        matches!(self.base, BaseType::Void)
    }

    pub const fn is_numeric(&self) -> bool {
        matches!(
            self.base,
            BaseType::Bool | BaseType::Int | BaseType::Uint | BaseType::Float
        )
    }

    pub const fn is_boolean(&self) -> bool {
        matches!(self.base, BaseType::Bool)
    }

    pub const fn is_integral(&self) -> bool {
        matches!(self.base, BaseType::Int | BaseType::Uint)
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self.base, BaseType::Int | BaseType::Float)
    }

    pub const fn is_floating_point(&self) -> bool {
        matches!(self.base, BaseType::Float)
    }

    pub const fn is_scalar(&self) -> bool {
        self.is_numeric() && !self.is_array() && self.rows == 1 && self.cols == 1
    }

    pub const fn is_vector(&self) -> bool {
        self.is_numeric() && self.rows > 1 && self.cols == 1
    }

    pub const fn is_matrix(&self) -> bool {
        self.is_numeric() && self.rows >= 1 && self.cols > 1
    }

    pub const fn is_array(&self) -> bool {
        self.array_length != 0
    }

    pub const fn is_struct(&self) -> bool {
        matches!(self.base, BaseType::Struct)
    }

    pub const fn is_texture(&self) -> bool {
        matches!(self.base, BaseType::Texture)
    }

    pub const fn is_sampler(&self) -> bool {
        matches!(self.base, BaseType::Sampler)
    }

    pub const fn is_string(&self) -> bool {
        matches!(self.base, BaseType::String)
    }

    pub const fn is_function(&self) -> bool {
        matches!(self.base, BaseType::Function)
    }

    /// Number of scalar lanes in one element of this type.
    pub const fn components(&self) -> u32 {
        self.rows * self.cols
    }

    /// The same type without any array dimension.
    pub fn element_type(&self) -> Self {
        Type {
            array_length: 0,
            ..*self
        }
    }

    const fn promotion_rank(&self) -> u32 {
        match self.base {
            BaseType::Bool => 1,
            BaseType::Int => 2,
            BaseType::Uint => 3,
            BaseType::Float => 4,
            _ => 0,
        }
    }

    /// Common result type of a binary expression over `a` and `b`.
    ///
    /// The base promotes along `bool < int < uint < float`. If one side is a
    /// scalar the other side's dimensions win (scalar broadcast), otherwise
    /// both dimensions widen to the maximum of the two.
    pub fn merge(a: &Type, b: &Type) -> Type {
        let base = if a.promotion_rank() >= b.promotion_rank() {
            a.base
        } else {
            b.base
        };
        let (rows, cols) = if a.is_scalar() {
            (b.rows.max(1), b.cols.max(1))
        } else if b.is_scalar() {
            (a.rows, a.cols)
        } else {
            (a.rows.max(b.rows), a.cols.max(b.cols))
        };
        Type {
            base,
            rows,
            cols,
            array_length: if a.array_length != 0 {
                a.array_length
            } else {
                b.array_length
            },
            definition: if a.definition == b.definition {
                a.definition
            } else {
                0
            },
            ..Type::default()
        }
    }

    /// Cost of implicitly converting `src` into `dst`.
    ///
    /// Zero means the conversion does not exist. An exact structural match is
    /// the cheapest positive cost, so overload resolution always prefers it.
    pub fn rank(src: &Type, dst: &Type) -> u32 {
        if src.is_array() != dst.is_array()
            || (src.array_length != dst.array_length
                && src.array_length > 0
                && dst.array_length > 0)
        {
            return 0;
        }
        if src.is_struct() || dst.is_struct() {
            return if src.definition == dst.definition && src.definition != 0 {
                1
            } else {
                0
            };
        }
        if src.base == dst.base && src.rows == dst.rows && src.cols == dst.cols {
            return 1;
        }
        if !src.is_numeric() || !dst.is_numeric() {
            return 0;
        }

        let mut cost = 2;
        if src.base != dst.base {
            let src_rank = src.promotion_rank();
            let dst_rank = dst.promotion_rank();
            // Promotions are preferred over demotions, so an int argument
            // picks a float overload before a float argument picks an int
            // one.
            cost += if dst_rank >= src_rank {
                1 + (dst_rank - src_rank)
            } else {
                4 + 2 * (src_rank - dst_rank)
            };
        }
        if src.rows == dst.rows && src.cols == dst.cols {
            // Base conversion only.
        } else if src.is_scalar() {
            // Scalars broadcast to any dimension.
            cost += 2;
        } else if src.cols == 1 && dst.cols == 1 && src.rows > dst.rows {
            // Vectors may truncate, never grow.
            cost += src.rows - dst.rows;
        } else {
            return 0;
        }
        cost
    }
}

/// A folded constant value.
///
/// Scalar, vector and matrix constants occupy the first
/// [`Type::components`] lanes of `data`; the same 32 bits are read as
/// `u32`, `i32` or `f32` depending on the type they travel with. Array and
/// struct constants nest in `elements`, string constants live in `string`.
/// Matrix lanes are packed column-major, matching how matrix composites are
/// constructed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Constant {
    pub data: [u32; 16],
    pub string: String,
    pub elements: Vec<Constant>,
}

impl Constant {
    pub fn from_int(value: i32) -> Self {
        let mut c = Constant::default();
        c.data[0] = value as u32;
        c
    }

    pub fn from_uint(value: u32) -> Self {
        let mut c = Constant::default();
        c.data[0] = value;
        c
    }

    pub fn from_float(value: f32) -> Self {
        let mut c = Constant::default();
        c.data[0] = value.to_bits();
        c
    }

    pub fn from_bool(value: bool) -> Self {
        Self::from_uint(value as u32)
    }

    pub fn from_string(value: String) -> Self {
        Constant {
            string: value,
            ..Constant::default()
        }
    }

    pub fn as_uint(&self, lane: usize) -> u32 {
        self.data[lane]
    }

    pub fn as_int(&self, lane: usize) -> i32 {
        self.data[lane] as i32
    }

    pub fn as_float(&self, lane: usize) -> f32 {
        f32::from_bits(self.data[lane])
    }

    pub fn set_uint(&mut self, lane: usize, value: u32) {
        self.data[lane] = value;
    }

    pub fn set_int(&mut self, lane: usize, value: i32) {
        self.data[lane] = value as u32;
    }

    pub fn set_float(&mut self, lane: usize, value: f32) {
        self.data[lane] = value.to_bits();
    }
}

/// Annotation block attached to variables and techniques: `< name = value; >`.
pub type Annotations = FastHashMap<String, Constant>;

/// Metadata for a texture declaration.
///
/// Textures never surface in the SPIR-V module; the reserved id only links
/// them to samplers and render targets.
#[derive(Clone, Debug)]
pub struct TextureInfo {
    pub id: u32,
    pub name: String,
    pub unique_name: String,
    pub semantic: String,
    pub annotations: Annotations,
    pub width: u32,
    pub height: u32,
    pub levels: u32,
    pub format: u32,
    pub srgb: bool,
}

impl Default for TextureInfo {
    fn default() -> Self {
        TextureInfo {
            id: 0,
            name: String::new(),
            unique_name: String::new(),
            semantic: String::new(),
            annotations: Annotations::default(),
            width: 1,
            height: 1,
            levels: 1,
            format: 8, // RGBA8
            srgb: false,
        }
    }
}

/// Metadata for a sampler declaration. The `filter` byte packs the three
/// filter states as `min << 4 | mag << 2 | mip`.
#[derive(Clone, Debug)]
pub struct SamplerInfo {
    pub id: u32,
    pub name: String,
    pub unique_name: String,
    pub texture: u32,
    pub annotations: Annotations,
    pub address_u: u32,
    pub address_v: u32,
    pub address_w: u32,
    pub filter: u32,
    pub min_lod: f32,
    pub max_lod: f32,
    pub lod_bias: f32,
    pub srgb: bool,
}

impl Default for SamplerInfo {
    fn default() -> Self {
        SamplerInfo {
            id: 0,
            name: String::new(),
            unique_name: String::new(),
            texture: 0,
            annotations: Annotations::default(),
            address_u: 3, // clamp
            address_v: 3,
            address_w: 3,
            filter: 0x15, // trilinear
            min_lod: f32::MIN,
            max_lod: f32::MAX,
            lod_bias: 0.0,
            srgb: false,
        }
    }
}

/// One member of the global uniform buffer.
#[derive(Clone, Debug)]
pub struct UniformInfo {
    pub name: String,
    pub ty: Type,
    pub offset: u32,
    pub size: u32,
    pub annotations: Annotations,
}

/// One draw configuration inside a technique.
#[derive(Clone, Debug)]
pub struct PassInfo {
    pub name: String,
    pub vs_entry_point: String,
    pub ps_entry_point: String,
    pub render_targets: [u32; 8],
    pub srgb_write_enable: bool,
    pub blend_enable: bool,
    pub stencil_enable: bool,
    pub clear_render_targets: bool,
    pub color_write_mask: u32,
    pub stencil_read_mask: u32,
    pub stencil_write_mask: u32,
    pub blend_op: u32,
    pub blend_op_alpha: u32,
    pub src_blend: u32,
    pub src_blend_alpha: u32,
    pub dest_blend: u32,
    pub dest_blend_alpha: u32,
    pub stencil_comparison_func: u32,
    pub stencil_reference_value: u32,
    pub stencil_op_pass: u32,
    pub stencil_op_fail: u32,
    pub stencil_op_depth_fail: u32,
}

impl Default for PassInfo {
    fn default() -> Self {
        PassInfo {
            name: String::new(),
            vs_entry_point: String::new(),
            ps_entry_point: String::new(),
            render_targets: [0; 8],
            srgb_write_enable: false,
            blend_enable: false,
            stencil_enable: false,
            clear_render_targets: true,
            color_write_mask: 0xF,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
            blend_op: 1,                // add
            blend_op_alpha: 1,          // add
            src_blend: 1,               // one
            src_blend_alpha: 1,         // one
            dest_blend: 0,              // zero
            dest_blend_alpha: 0,        // zero
            stencil_comparison_func: 8, // always
            stencil_reference_value: 0,
            stencil_op_pass: 1,       // keep
            stencil_op_fail: 1,       // keep
            stencil_op_depth_fail: 1, // keep
        }
    }
}

/// A named, ordered set of passes presenting one rendering effect.
#[derive(Clone, Debug, Default)]
pub struct TechniqueInfo {
    pub name: String,
    pub unique_name: String,
    pub annotations: Annotations,
    pub passes: Vec<PassInfo>,
}

/// The result of a successful compilation: a SPIR-V binary plus the
/// pipeline-state bundle describing how the host should use it.
#[derive(Clone, Debug, Default)]
pub struct Module {
    /// The serialized SPIR-V word stream.
    pub spirv: Vec<u32>,
    pub techniques: Vec<TechniqueInfo>,
    pub textures: Vec<TextureInfo>,
    pub samplers: Vec<SamplerInfo>,
    pub uniforms: Vec<UniformInfo>,
    /// Formatted warnings produced during compilation, in the same
    /// `<source>(<line>, <col>): warning X<code>: <message>` form errors use.
    pub diagnostics: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float(rows: u32, cols: u32) -> Type {
        Type::new(BaseType::Float, rows, cols)
    }

    #[test]
    fn merge_is_symmetric() {
        let cases = [
            (Type::BOOL, Type::FLOAT),
            (Type::INT, Type::UINT),
            (float(3, 1), Type::FLOAT),
            (float(2, 1), Type::new(BaseType::Int, 4, 1)),
            (float(4, 4), Type::FLOAT),
            (float(2, 2), Type::new(BaseType::Uint, 3, 3)),
        ];
        for (a, b) in cases {
            let ab = Type::merge(&a, &b);
            let ba = Type::merge(&b, &a);
            assert_eq!(ab.base, ba.base);
            assert_eq!((ab.rows, ab.cols), (ba.rows, ba.cols));
        }
    }

    #[test]
    fn merge_promotes_base_and_broadcasts_scalars() {
        let m = Type::merge(&Type::INT, &Type::FLOAT);
        assert_eq!(m.base, BaseType::Float);

        let m = Type::merge(&Type::FLOAT, &float(3, 1));
        assert_eq!((m.rows, m.cols), (3, 1));

        let m = Type::merge(&Type::BOOL, &Type::UINT);
        assert_eq!(m.base, BaseType::Uint);
    }

    #[test]
    fn rank_prefers_exact_matches() {
        let exact = Type::rank(&float(3, 1), &float(3, 1));
        let convert = Type::rank(&Type::new(BaseType::Int, 3, 1), &float(3, 1));
        let truncate = Type::rank(&float(4, 1), &float(3, 1));
        assert!(exact > 0 && convert > 0 && truncate > 0);
        assert!(exact < convert);
        assert!(exact < truncate);
    }

    #[test]
    fn rank_prefers_promotions_over_demotions() {
        let promote = Type::rank(&Type::INT, &Type::FLOAT);
        let demote = Type::rank(&Type::FLOAT, &Type::INT);
        assert!(promote > 0 && demote > 0);
        assert!(promote < demote);
    }

    #[test]
    fn rank_rejects_impossible_conversions() {
        // Vectors never grow implicitly.
        assert_eq!(Type::rank(&float(2, 1), &float(4, 1)), 0);
        // Matrix dimensions must agree.
        assert_eq!(Type::rank(&float(2, 2), &float(3, 3)), 0);
        // Arrays only convert to arrays of the same length.
        let mut a = float(1, 1);
        a.array_length = 3;
        let mut b = float(1, 1);
        b.array_length = 2;
        assert_eq!(Type::rank(&a, &b), 0);
        assert_eq!(Type::rank(&a, &float(1, 1)), 0);
        // Scalars broadcast anywhere.
        assert!(Type::rank(&Type::FLOAT, &float(4, 4)) > 0);
    }

    #[test]
    fn constant_lanes_reinterpret() {
        let mut c = Constant::from_float(1.5);
        assert_eq!(c.as_float(0), 1.5);
        c.set_int(1, -3);
        assert_eq!(c.as_int(1), -3);
        assert_eq!(c.as_uint(1), (-3i32) as u32);
    }
}
