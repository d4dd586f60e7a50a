//! The intrinsic function registry and semantic-name resolution.
//!
//! Intrinsics are pseudo-functions that overload resolution treats exactly
//! like user functions; each overload names the SPIR-V opcode or
//! `GLSL.std.450` extended opcode it lowers to. A handful are *magic* and
//! expand inline at the call site instead (`rcp`, `saturate`, `sincos` and
//! the texture sampling operations).

use crate::{BaseType, FastHashMap, Qualifiers, Type};
use spirv::{GLOp, Op};

/// How a resolved intrinsic call turns into instructions.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Lowering {
    /// A core instruction taking the loaded arguments in order.
    Core(Op),
    /// A `GLSL.std.450` extended instruction.
    Ext(GLOp),
    Rcp,
    Saturate,
    SinCos,
    Sample,
    SampleLevel,
}

#[derive(Clone, Debug)]
pub(crate) struct Intrinsic {
    pub lowering: Lowering,
    pub return_type: Type,
    pub parameters: Vec<Type>,
}

pub(crate) struct IntrinsicTable {
    map: FastHashMap<&'static str, Vec<Intrinsic>>,
}

fn float(rows: u32) -> Type {
    Type::new(BaseType::Float, rows, 1)
}

fn int(rows: u32) -> Type {
    Type::new(BaseType::Int, rows, 1)
}

fn uint(rows: u32) -> Type {
    Type::new(BaseType::Uint, rows, 1)
}

fn out_param(ty: Type) -> Type {
    let mut ty = ty.with_qualifiers(Qualifiers::OUT);
    ty.is_pointer = true;
    ty
}

impl IntrinsicTable {
    pub fn overloads(&self, name: &str) -> Option<&[Intrinsic]> {
        self.map.get(name).map(Vec::as_slice)
    }

    fn add(&mut self, name: &'static str, lowering: Lowering, ret: Type, parameters: Vec<Type>) {
        self.map.entry(name).or_default().push(Intrinsic {
            lowering,
            return_type: ret,
            parameters,
        });
    }

    pub fn new() -> Self {
        let mut table = IntrinsicTable {
            map: FastHashMap::default(),
        };

        // Componentwise float functions, one overload per vector width.
        let unary: &[(&'static str, GLOp)] = &[
            ("abs", GLOp::FAbs),
            ("acos", GLOp::Acos),
            ("asin", GLOp::Asin),
            ("atan", GLOp::Atan),
            ("ceil", GLOp::Ceil),
            ("cos", GLOp::Cos),
            ("cosh", GLOp::Cosh),
            ("degrees", GLOp::Degrees),
            ("exp", GLOp::Exp),
            ("exp2", GLOp::Exp2),
            ("floor", GLOp::Floor),
            ("frac", GLOp::Fract),
            ("log", GLOp::Log),
            ("log2", GLOp::Log2),
            ("radians", GLOp::Radians),
            ("round", GLOp::Round),
            ("rsqrt", GLOp::InverseSqrt),
            ("sign", GLOp::FSign),
            ("sin", GLOp::Sin),
            ("sinh", GLOp::Sinh),
            ("sqrt", GLOp::Sqrt),
            ("tan", GLOp::Tan),
            ("tanh", GLOp::Tanh),
            ("trunc", GLOp::Trunc),
        ];
        let binary: &[(&'static str, GLOp)] = &[
            ("atan2", GLOp::Atan2),
            ("max", GLOp::FMax),
            ("min", GLOp::FMin),
            ("pow", GLOp::Pow),
            ("reflect", GLOp::Reflect),
            ("step", GLOp::Step),
        ];
        let ternary: &[(&'static str, GLOp)] = &[
            ("clamp", GLOp::FClamp),
            ("lerp", GLOp::FMix),
            ("mad", GLOp::Fma),
            ("smoothstep", GLOp::SmoothStep),
        ];
        for rows in 1..=4 {
            let v = float(rows);
            for &(name, op) in unary {
                table.add(name, Lowering::Ext(op), v, vec![v]);
            }
            for &(name, op) in binary {
                table.add(name, Lowering::Ext(op), v, vec![v, v]);
            }
            for &(name, op) in ternary {
                table.add(name, Lowering::Ext(op), v, vec![v, v, v]);
            }

            table.add("normalize", Lowering::Ext(GLOp::Normalize), v, vec![v]);
            table.add("length", Lowering::Ext(GLOp::Length), float(1), vec![v]);
            table.add(
                "distance",
                Lowering::Ext(GLOp::Distance),
                float(1),
                vec![v, v],
            );
            table.add("dot", Lowering::Core(Op::Dot), float(1), vec![v, v]);
            table.add(
                "refract",
                Lowering::Ext(GLOp::Refract),
                v,
                vec![v, v, float(1)],
            );
            table.add("fmod", Lowering::Core(Op::FRem), v, vec![v, v]);
            table.add("ddx", Lowering::Core(Op::DPdx), v, vec![v]);
            table.add("ddy", Lowering::Core(Op::DPdy), v, vec![v]);

            table.add("rcp", Lowering::Rcp, v, vec![v]);
            table.add("saturate", Lowering::Saturate, v, vec![v]);
            table.add(
                "sincos",
                Lowering::SinCos,
                Type::VOID,
                vec![v, out_param(v), out_param(v)],
            );

            // Integer counterparts where the extended set distinguishes
            // signedness.
            let iv = int(rows);
            let uv = uint(rows);
            table.add("abs", Lowering::Ext(GLOp::SAbs), iv, vec![iv]);
            table.add("sign", Lowering::Ext(GLOp::SSign), iv, vec![iv]);
            table.add("max", Lowering::Ext(GLOp::SMax), iv, vec![iv, iv]);
            table.add("max", Lowering::Ext(GLOp::UMax), uv, vec![uv, uv]);
            table.add("min", Lowering::Ext(GLOp::SMin), iv, vec![iv, iv]);
            table.add("min", Lowering::Ext(GLOp::UMin), uv, vec![uv, uv]);
            table.add("clamp", Lowering::Ext(GLOp::SClamp), iv, vec![iv, iv, iv]);
            table.add("clamp", Lowering::Ext(GLOp::UClamp), uv, vec![uv, uv, uv]);
        }

        table.add(
            "cross",
            Lowering::Ext(GLOp::Cross),
            float(3),
            vec![float(3), float(3)],
        );

        for rows in 2..=4 {
            for cols in 2..=4 {
                let mat = Type::matrix(BaseType::Float, rows, cols);
                table.add(
                    "transpose",
                    Lowering::Core(Op::Transpose),
                    Type::matrix(BaseType::Float, cols, rows),
                    vec![mat],
                );
                table.add(
                    "mul",
                    Lowering::Core(Op::MatrixTimesVector),
                    float(rows),
                    vec![mat, float(cols)],
                );
                table.add(
                    "mul",
                    Lowering::Core(Op::VectorTimesMatrix),
                    float(cols),
                    vec![float(rows), mat],
                );
                for inner in 2..=4 {
                    table.add(
                        "mul",
                        Lowering::Core(Op::MatrixTimesMatrix),
                        Type::matrix(BaseType::Float, rows, cols),
                        vec![
                            Type::matrix(BaseType::Float, rows, inner),
                            Type::matrix(BaseType::Float, inner, cols),
                        ],
                    );
                }
            }
        }

        table.add(
            "tex2D",
            Lowering::Sample,
            float(4),
            vec![Type::SAMPLER, float(2)],
        );
        table.add(
            "tex2Dlod",
            Lowering::SampleLevel,
            float(4),
            vec![Type::SAMPLER, float(4)],
        );

        table
    }
}

/// Map a semantic string onto an interface built-in, case-insensitively.
/// Names that are not built-ins yield a location index taken from their
/// trailing digits.
pub(crate) fn semantic_to_builtin(semantic: &str) -> (Option<spirv::BuiltIn>, u32) {
    let upper = semantic.to_ascii_uppercase();
    match upper.as_str() {
        "SV_POSITION" => return (Some(spirv::BuiltIn::Position), 0),
        "SV_POINTSIZE" => return (Some(spirv::BuiltIn::PointSize), 0),
        "SV_DEPTH" => return (Some(spirv::BuiltIn::FragDepth), 0),
        "VERTEXID" | "SV_VERTEXID" => return (Some(spirv::BuiltIn::VertexId), 0),
        _ => {}
    }
    let digits = upper
        .rfind(|c: char| !c.is_ascii_digit())
        .map(|last| &upper[last + 1..])
        .unwrap_or(&upper);
    (None, digits.parse().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantics_map_case_insensitively() {
        assert_eq!(
            semantic_to_builtin("sv_position"),
            (Some(spirv::BuiltIn::Position), 0)
        );
        assert_eq!(
            semantic_to_builtin("SV_Depth"),
            (Some(spirv::BuiltIn::FragDepth), 0)
        );
        assert_eq!(semantic_to_builtin("TEXCOORD3"), (None, 3));
        assert_eq!(semantic_to_builtin("SV_TARGET1"), (None, 1));
        assert_eq!(semantic_to_builtin("COLOR"), (None, 0));
        assert_eq!(semantic_to_builtin("NORMAL12"), (None, 12));
    }

    #[test]
    fn registry_provides_width_matched_overloads() {
        let table = IntrinsicTable::new();
        let sin = table.overloads("sin").unwrap();
        assert_eq!(sin.len(), 4);
        let dot = table.overloads("dot").unwrap();
        assert!(dot.iter().all(|o| o.return_type == float(1)));
        assert!(table.overloads("tex2D").is_some());
        assert!(table.overloads("nonsense").is_none());
    }
}
