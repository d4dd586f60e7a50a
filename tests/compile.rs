//! End-to-end compilation tests: feed effect sources through the token
//! contract and inspect the serialized module plus the pipeline bundle.

mod common;

use common::{
    compile, compile_with, contains_packed_string, count_op, find_ops, instructions,
};
use effectfx::{BaseType, Options};
use spirv::{BuiltIn, Decoration, ExecutionModel, Op, StorageClass};

fn variables_of_class(words: &[u32], class: StorageClass) -> Vec<u32> {
    find_ops(words, Op::Variable)
        .into_iter()
        .filter(|operands| operands[2] == class as u32)
        .map(|operands| operands[1])
        .collect()
}

fn decorations(words: &[u32], decoration: Decoration) -> Vec<Vec<u32>> {
    find_ops(words, Op::Decorate)
        .into_iter()
        .filter(|operands| operands[1] == decoration as u32)
        .collect()
}

#[test]
fn pixel_shader_entry_point_interface() {
    let module = compile(
        r#"
        float4 main(float2 uv : TEXCOORD0) : SV_TARGET
        {
            return float4(uv, 0, 1);
        }

        technique t { pass { PixelShader = main; } }
        "#,
    );
    let words = &module.spirv;

    let entry_points = find_ops(words, Op::EntryPoint);
    assert_eq!(entry_points.len(), 1);
    assert_eq!(entry_points[0][0], ExecutionModel::Fragment as u32);
    assert!(contains_packed_string(words, "main"));

    // One flat input, one flat output, both with location zero.
    assert_eq!(variables_of_class(words, StorageClass::Input).len(), 1);
    assert_eq!(variables_of_class(words, StorageClass::Output).len(), 1);
    let locations = decorations(words, Decoration::Location);
    assert_eq!(locations.len(), 2);
    assert!(locations.iter().all(|operands| operands[2] == 0));

    // TEXCOORD inputs are plain locations, not built-ins.
    assert!(decorations(words, Decoration::BuiltIn).is_empty());

    // Fragment stages declare their origin.
    assert_eq!(count_op(words, Op::ExecutionMode), 1);

    assert_eq!(module.techniques.len(), 1);
    assert_eq!(module.techniques[0].passes[0].ps_entry_point, "main");
    assert!(module.techniques[0].passes[0].vs_entry_point.is_empty());
}

#[test]
fn globals_block_uses_std140_offsets() {
    let module = compile(
        r#"
        uniform float4x4 M;
        uniform float3 v;
        "#,
    );
    let words = &module.spirv;

    assert_eq!(module.uniforms.len(), 2);
    assert_eq!(module.uniforms[0].offset, 0);
    assert_eq!(module.uniforms[0].size, 64);
    // A three-component vector pads to four slots.
    assert_eq!(module.uniforms[1].offset, 64);
    assert_eq!(module.uniforms[1].size, 16);

    let offsets: Vec<u32> = find_ops(words, Op::MemberDecorate)
        .into_iter()
        .filter(|operands| operands[2] == Decoration::Offset as u32)
        .map(|operands| operands[3])
        .collect();
    assert_eq!(offsets, &[0, 64]);

    let block_decorations = decorations(words, Decoration::Block);
    assert_eq!(block_decorations.len(), 1);
    assert_eq!(decorations(words, Decoration::DescriptorSet).len(), 1);
    assert!(contains_packed_string(words, "$Globals"));

    // The block variable lives in uniform storage.
    assert_eq!(variables_of_class(words, StorageClass::Uniform).len(), 1);
}

#[test]
fn float_initializer_folds_into_int_constant() {
    let module = compile(
        r#"
        float4 vs_main() : SV_POSITION
        {
            int x = 1.5;
            return float4(x, 0, 0, 1);
        }

        technique t { pass { VertexShader = vs_main; } }
        "#,
    );
    assert!(module.diagnostics.contains("warning X3206"));

    // The conversion happened at compile time.
    let words = &module.spirv;
    assert_eq!(count_op(words, Op::ConvertFToS), 0);
    let int_type = find_ops(words, Op::TypeInt)
        .into_iter()
        .find(|operands| operands[2] == 1)
        .map(|operands| operands[0])
        .unwrap();
    assert!(find_ops(words, Op::Constant)
        .iter()
        .any(|operands| operands[0] == int_type && operands[2] == 1));
}

#[test]
fn loop_with_break_builds_one_merge_pair() {
    let module = compile(
        r#"
        void looped()
        {
            for (int i = 0; i < 4; ++i)
            {
                if (i == 2)
                    break;
            }
        }

        technique t { pass { VertexShader = looped; } }
        "#,
    );
    let words = &module.spirv;

    let loop_merges = find_ops(words, Op::LoopMerge);
    assert_eq!(loop_merges.len(), 1);
    assert_eq!(count_op(words, Op::SelectionMerge), 1);

    // `break` branches straight to the loop merge label.
    let merge_label = loop_merges[0][0];
    assert!(find_ops(words, Op::Branch)
        .iter()
        .any(|operands| operands[0] == merge_label));
}

#[test]
fn struct_io_flattens_into_interface_variables() {
    let module = compile(
        r#"
        struct VSOut
        {
            float4 pos : SV_POSITION;
            float2 uv : TEXCOORD0;
        };

        VSOut vs2(uint id : SV_VERTEXID)
        {
            VSOut o;
            o.pos = float4(0, 0, 0, 1);
            o.uv = float2(id, 0);
            return o;
        }

        technique t2 { pass { VertexShader = vs2; } }
        "#,
    );
    let words = &module.spirv;

    let entry_points = find_ops(words, Op::EntryPoint);
    assert_eq!(entry_points.len(), 1);
    assert_eq!(entry_points[0][0], ExecutionModel::Vertex as u32);
    // model + id + one word of name + three interface variables
    assert_eq!(entry_points[0].len(), 6);

    let builtins: Vec<u32> = decorations(words, Decoration::BuiltIn)
        .into_iter()
        .map(|operands| operands[2])
        .collect();
    assert!(builtins.contains(&(BuiltIn::Position as u32)));
    assert!(builtins.contains(&(BuiltIn::VertexId as u32)));

    assert_eq!(variables_of_class(words, StorageClass::Input).len(), 1);
    assert_eq!(variables_of_class(words, StorageClass::Output).len(), 2);

    // The struct return is reassembled member by member.
    assert!(count_op(words, Op::CompositeExtract) >= 2);
}

#[test]
fn technique_pass_states_parse_into_the_bundle() {
    let module = compile(
        r#"
        texture tex0 { Width = 64; Height = 32; Format = RGBA16F; };

        technique t
        {
            pass p0
            {
                RenderTarget = tex0;
                BlendEnable = true;
                SrcBlend = SRCALPHA;
                DestBlend = INVSRCALPHA;
                BlendOp = ADD;
                StencilFunc = LEQUAL;
                ColorWriteMask = 7;
            }
        }
        "#,
    );

    assert_eq!(module.textures.len(), 1);
    assert_eq!(module.textures[0].width, 64);
    assert_eq!(module.textures[0].height, 32);
    assert_eq!(module.textures[0].format, 10);

    let pass = &module.techniques[0].passes[0];
    assert_eq!(pass.name, "p0");
    assert_eq!(pass.render_targets[0], module.textures[0].id);
    assert!(pass.blend_enable);
    assert_eq!(pass.src_blend, 3);
    assert_eq!(pass.dest_blend, 5);
    assert_eq!(pass.blend_op, 1);
    assert_eq!(pass.stencil_comparison_func, 4);
    assert_eq!(pass.color_write_mask, 7);
    // Untouched states keep their defaults.
    assert!(pass.clear_render_targets);
    assert_eq!(pass.stencil_op_pass, 1);
}

#[test]
fn samplers_bind_their_texture_semantic() {
    let module = compile(
        r#"
        texture backbuffer : COLOR0;
        sampler samp0
        {
            Texture = backbuffer;
            MinFilter = POINT;
            AddressU = WRAP;
        };
        "#,
    );
    let words = &module.spirv;

    assert_eq!(module.samplers.len(), 1);
    let sampler = &module.samplers[0];
    assert_eq!(sampler.texture, module.textures[0].id);
    // POINT min filter clears the high bits of the default trilinear
    // packing; the others stay linear.
    assert_eq!(sampler.filter, 0x05);
    assert_eq!(sampler.address_u, 1);
    assert_eq!(sampler.address_v, 3);

    // The combined image sampler records the source semantic for the host.
    assert_eq!(count_op(words, Op::DecorateString), 1);
    assert!(contains_packed_string(words, "COLOR0"));
    assert!(contains_packed_string(words, "SPV_GOOGLE_hlsl_functionality1"));
    assert_eq!(
        variables_of_class(words, StorageClass::UniformConstant).len(),
        1
    );
}

#[test]
fn intrinsics_lower_to_extended_and_image_ops() {
    let module = compile(
        r#"
        texture tex;
        sampler samp { Texture = tex; };

        float4 ps_main(float2 uv : TEXCOORD0) : SV_TARGET
        {
            float s, c;
            sincos(uv.x, s, c);
            float3 n = normalize(float3(s, c, 1.0));
            float4 color = tex2D(samp, uv);
            return saturate(color + dot(n, n) * rcp(2.0));
        }

        technique T { pass { PixelShader = ps_main; } }
        "#,
    );
    let words = &module.spirv;

    assert!(contains_packed_string(words, "GLSL.std.450"));
    assert_eq!(count_op(words, Op::ImageSampleImplicitLod), 1);
    assert_eq!(count_op(words, Op::Dot), 1);
    // Sin, Cos, Normalize, FClamp at least.
    assert!(count_op(words, Op::ExtInst) >= 4);
    // rcp is one over x.
    assert!(count_op(words, Op::FDiv) >= 1);
    assert_eq!(count_op(words, Op::SampledImage), 0);
}

#[test]
fn explicit_lod_sampling_extracts_the_level() {
    let module = compile(
        r#"
        texture tex;
        sampler samp { Texture = tex; };

        float4 ps_main(float4 uv : TEXCOORD0) : SV_TARGET
        {
            return tex2Dlod(samp, uv);
        }

        technique T { pass { PixelShader = ps_main; } }
        "#,
    );
    let words = &module.spirv;
    let samples = find_ops(words, Op::ImageSampleExplicitLod);
    assert_eq!(samples.len(), 1);
    // result type, result, image, coordinate, Lod mask, level operand
    assert_eq!(samples[0][4], spirv::ImageOperands::LOD.bits());
}

#[test]
fn short_circuit_mode_branches_eager_mode_selects() {
    let source = r#"
        float4 f(float2 uv : TEXCOORD0) : SV_TARGET
        {
            bool a = uv.x > 0.0;
            bool b = uv.y > 0.0;
            if (a && b)
                return float4(1, 1, 1, 1);
            return float4(0, 0, 0, 1);
        }

        technique t { pass { PixelShader = f; } }
    "#;

    let branching = compile(source);
    assert!(count_op(&branching.spirv, Op::Phi) >= 1);
    assert_eq!(count_op(&branching.spirv, Op::LogicalAnd), 0);

    let eager = compile_with(
        source,
        &Options {
            short_circuit: false,
        },
    );
    assert_eq!(count_op(&eager.spirv, Op::Phi), 0);
    assert_eq!(count_op(&eager.spirv, Op::LogicalAnd), 1);
}

#[test]
fn swizzle_stores_preserve_unwritten_lanes() {
    let module = compile(
        r#"
        float4 g(float2 uv : TEXCOORD0) : SV_TARGET
        {
            float4 v = float4(0, 0, 0, 0);
            v.xy = uv;
            v.zw = uv.yx;
            return v;
        }

        technique t { pass { PixelShader = g; } }
        "#,
    );
    let words = &module.spirv;
    // Two rewriting stores plus the `.yx` read.
    assert!(count_op(words, Op::VectorShuffle) >= 3);
    assert!(count_op(words, Op::Store) >= 2);
}

#[test]
fn namespaced_functions_resolve_in_pass_states() {
    let module = compile(
        r#"
        namespace ns
        {
            float4 vsx() : SV_POSITION { return float4(0, 0, 0, 1); }
        }

        technique t { pass { VertexShader = ns::vsx; } }
        "#,
    );
    let words = &module.spirv;
    let entry_points = find_ops(words, Op::EntryPoint);
    assert_eq!(entry_points.len(), 1);
    assert_eq!(entry_points[0][0], ExecutionModel::Vertex as u32);
    assert_eq!(module.techniques[0].passes[0].vs_entry_point, "vsx");
}

#[test]
fn one_pass_can_bind_both_stages() {
    let module = compile(
        r#"
        float4 vs() : SV_POSITION { return float4(0, 0, 0, 1); }
        float4 ps() : SV_TARGET { return float4(1, 0, 0, 1); }

        technique t { pass { VertexShader = vs; PixelShader = ps; } }
        "#,
    );
    let words = &module.spirv;

    let entry_points = find_ops(words, Op::EntryPoint);
    assert_eq!(entry_points.len(), 2);
    let models: Vec<u32> = entry_points.iter().map(|operands| operands[0]).collect();
    assert!(models.contains(&(ExecutionModel::Vertex as u32)));
    assert!(models.contains(&(ExecutionModel::Fragment as u32)));

    let pass = &module.techniques[0].passes[0];
    assert_eq!(pass.vs_entry_point, "vs");
    assert_eq!(pass.ps_entry_point, "ps");
}

#[test]
fn bool_uniforms_widen_to_uint() {
    let module = compile("uniform bool flag;");
    assert_eq!(module.uniforms.len(), 1);
    assert_eq!(module.uniforms[0].ty.base, BaseType::Uint);
    assert_eq!(module.uniforms[0].size, 4);
}

#[test]
fn uniform_reads_go_through_the_block() {
    let module = compile(
        r#"
        uniform float4 tint;

        float4 h(float2 uv : TEXCOORD0) : SV_TARGET { return tint; }

        technique t { pass { PixelShader = h; } }
        "#,
    );
    let words = &module.spirv;
    assert!(count_op(words, Op::AccessChain) >= 1);
    assert!(find_ops(words, Op::TypePointer)
        .iter()
        .any(|operands| operands[1] == StorageClass::Uniform as u32));
}

#[test]
fn static_array_globals_get_composite_initializers() {
    let module = compile(
        r#"
        static float weights[3] = { 1.0, 2.0, 3.0 };

        float4 k() : SV_POSITION { return float4(weights[0], weights[1], weights[2], 1); }

        technique t { pass { VertexShader = k; } }
        "#,
    );
    let words = &module.spirv;
    assert!(count_op(words, Op::ConstantComposite) >= 1);
    assert_eq!(count_op(words, Op::TypeArray), 1);
    assert_eq!(variables_of_class(words, StorageClass::Private).len(), 1);
}

#[test]
fn annotations_attach_to_uniforms() {
    let module = compile(
        r#"
        uniform float strength < string ui_type = "slider"; float ui_max = 2.0; > ;
        "#,
    );
    assert!(module.diagnostics.contains("warning X4717"));
    let annotations = &module.uniforms[0].annotations;
    assert_eq!(annotations["ui_type"].string, "slider");
    assert_eq!(annotations["ui_max"].as_float(0), 2.0);
}

#[test]
fn diagnostics_use_the_host_format() {
    let module = compile(
        r#"
        float4 w() : SV_POSITION { float d = 1.5l; return float4(d, 0, 0, 1); }
        technique t { pass { VertexShader = w; } }
        "#,
    );
    assert!(module.diagnostics.contains("test.fx("));
    assert!(module.diagnostics.contains("): warning X5000: "));
}

#[test]
fn empty_switch_warns_but_compiles() {
    let module = compile(
        r#"
        void s() { int x = 1; switch (x) { } }
        technique t { pass { VertexShader = s; } }
        "#,
    );
    assert!(module.diagnostics.contains("warning X5002"));
    assert_eq!(count_op(&module.spirv, Op::Switch), 1);
}

#[test]
fn overload_resolution_prefers_exact_matches() {
    let module = compile(
        r#"
        float pick(float x) { return x; }
        float pick(int x) { return 0.0; }

        float4 v() : SV_POSITION { return float4(pick(1.5f), 0, 0, 1); }

        technique t { pass { VertexShader = v; } }
        "#,
    );
    // Both overloads, the shader itself and its wrapper.
    assert_eq!(count_op(&module.spirv, Op::Function), 4);
}

#[test]
fn generic_vector_syntax_matches_shorthand() {
    let module = compile(
        r#"
        uniform vector<int, 3> iv;
        uniform matrix<float, 2, 2> fm;
        "#,
    );
    assert_eq!(module.uniforms[0].ty.base, BaseType::Int);
    assert_eq!(module.uniforms[0].ty.rows, 3);
    assert_eq!(module.uniforms[1].ty.rows, 2);
    assert_eq!(module.uniforms[1].ty.cols, 2);
}

#[test]
fn every_block_terminates_and_ids_are_bounded() {
    // A structural sweep over a module with all control flow kinds.
    let module = compile(
        r#"
        float4 cf(float2 uv : TEXCOORD0) : SV_TARGET
        {
            float acc = 0.0;
            for (int i = 0; i < 4; ++i)
            {
                if (i == 2)
                    continue;
                acc += uv.x;
            }
            while (acc > 10.0) { acc -= 1.0; }
            do { acc += 0.5; } while (acc < 1.0);
            switch (int(acc))
            {
                case 0: acc = 1.0; break;
                case 1:
                case 2: acc = 2.0; break;
                default: acc = 3.0;
            }
            return acc > 1.0 ? float4(1, 1, 1, 1) : float4(uv, acc, 1);
        }

        technique t { pass { PixelShader = cf; } }
        "#,
    );
    let words = &module.spirv;

    assert_eq!(count_op(words, Op::LoopMerge), 3);
    // if + switch + ternary
    assert_eq!(count_op(words, Op::SelectionMerge), 3);

    // Every label is eventually followed by exactly one terminator before
    // the next label.
    let mut open = false;
    for (op, _) in instructions(words) {
        if op == Op::Label as u32 {
            assert!(!open, "two labels without a terminator between them");
            open = true;
        }
        if [
            Op::Branch as u32,
            Op::BranchConditional as u32,
            Op::Switch as u32,
            Op::Return as u32,
            Op::ReturnValue as u32,
            Op::Kill as u32,
        ]
        .contains(&op)
        {
            assert!(open, "terminator outside of a block");
            open = false;
        }
    }

    // The header bound exceeds every id used anywhere.
    let bound = words[3];
    for (op, operands) in instructions(words) {
        if op == Op::Label as u32 {
            assert!(operands[0] < bound);
        }
    }
}
