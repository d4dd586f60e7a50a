//! Diagnostic tests: every error carries the HLSL-compatible code the host
//! expects, and the parser recovers well enough to report more than one.

mod common;

use common::{compile_errors, has_error_code};

#[test]
fn array_initializer_length_mismatch() {
    let errors = compile_errors("static float a[3] = { 1, 2 };");
    assert!(has_error_code(&errors, 3017), "{}", errors.log);
}

#[test]
fn recursion_is_rejected() {
    let errors = compile_errors("float f(float x) { return f(x); }");
    assert!(has_error_code(&errors, 3500), "{}", errors.log);
}

#[test]
fn undeclared_identifiers() {
    let errors = compile_errors("float4 g() : SV_POSITION { return missing; }");
    assert!(has_error_code(&errors, 3004), "{}", errors.log);
}

#[test]
fn redefinition_in_the_same_scope() {
    let errors = compile_errors("uniform float x; uniform float x;");
    assert!(has_error_code(&errors, 3003), "{}", errors.log);
}

#[test]
fn break_and_continue_need_a_loop() {
    let errors = compile_errors("void h() { break; }");
    assert!(has_error_code(&errors, 3518), "{}", errors.log);

    let errors = compile_errors("void h() { continue; }");
    assert!(has_error_code(&errors, 3519), "{}", errors.log);
}

#[test]
fn bitwise_operators_need_integers() {
    let errors = compile_errors("void h() { float x = 1.0; int y = x & 2; }");
    assert!(has_error_code(&errors, 3082), "{}", errors.log);
}

#[test]
fn uniforms_are_not_assignable() {
    let errors = compile_errors("uniform float u; void h() { u = 1.0; }");
    assert!(has_error_code(&errors, 3025), "{}", errors.log);
}

#[test]
fn annotation_values_must_be_constant() {
    let errors = compile_errors(
        "static float s = 1.0; uniform float q < val = s; > ;",
    );
    assert!(has_error_code(&errors, 3011), "{}", errors.log);
}

#[test]
fn ambiguous_overloads_are_reported() {
    // A scalar broadcasts into either vector width at the same cost.
    let errors = compile_errors(
        r#"
        float pick(float3 v) { return v.x; }
        float pick(float4 v) { return v.x; }

        void h() { pick(1.0); }
        "#,
    );
    assert!(has_error_code(&errors, 3067), "{}", errors.log);
}

#[test]
fn argument_count_mismatches_find_no_overload() {
    let errors = compile_errors(
        r#"
        float pick(float x) { return x; }
        void h() { pick(1.0, 2.0); }
        "#,
    );
    assert!(has_error_code(&errors, 3013), "{}", errors.log);
}

#[test]
fn array_equality_is_a_type_mismatch() {
    let errors = compile_errors(
        r#"
        void h()
        {
            float a[2] = { 1, 2 };
            float b[2] = { 1, 2 };
            bool c = a == b;
        }
        "#,
    );
    assert!(has_error_code(&errors, 3020), "{}", errors.log);
}

#[test]
fn return_arity_matches_the_signature() {
    let errors = compile_errors("void h() { return 1; }");
    assert!(has_error_code(&errors, 3079), "{}", errors.log);

    let errors = compile_errors("float h() { return; }");
    assert!(has_error_code(&errors, 3080), "{}", errors.log);
}

#[test]
fn conditions_must_be_scalar() {
    let errors = compile_errors(
        "void h() { float2 v = float2(1, 1); if (v) return; }",
    );
    assert!(has_error_code(&errors, 3019), "{}", errors.log);
}

#[test]
fn textures_and_samplers_cannot_be_local() {
    let errors = compile_errors("void h() { texture t; }");
    assert!(has_error_code(&errors, 3038), "{}", errors.log);
}

#[test]
fn interface_qualifiers_are_for_parameters() {
    let errors = compile_errors("in float4 gv;");
    assert!(has_error_code(&errors, 3055), "{}", errors.log);
}

#[test]
fn constants_need_initializers() {
    let errors = compile_errors("void h() { const float c; }");
    assert!(has_error_code(&errors, 3012), "{}", errors.log);
}

#[test]
fn samplers_need_a_texture() {
    let errors = compile_errors("sampler s { MinFilter = LINEAR; };");
    assert!(has_error_code(&errors, 3012), "{}", errors.log);
}

#[test]
fn repeated_swizzle_components_are_read_only() {
    let errors = compile_errors(
        r#"
        void h()
        {
            float4 v = float4(0, 0, 0, 0);
            v.xx = float2(1, 1);
        }
        "#,
    );
    assert!(has_error_code(&errors, 3025), "{}", errors.log);
}

#[test]
fn repeated_matrix_swizzle_components_are_read_only() {
    let errors = compile_errors(
        r#"
        void h()
        {
            float2x2 m = float2x2(1, 2, 3, 4);
            m._11_11 = float2(1, 1);
        }
        "#,
    );
    assert!(has_error_code(&errors, 3025), "{}", errors.log);
}

#[test]
fn mixed_swizzle_sets_are_invalid() {
    let errors = compile_errors(
        r#"
        void h()
        {
            float4 v = float4(0, 0, 0, 0);
            float2 w = v.xg;
        }
        "#,
    );
    assert!(has_error_code(&errors, 3018), "{}", errors.log);
}

#[test]
fn array_dimensions_are_checked() {
    let errors = compile_errors("void h() { float a[0]; }");
    assert!(has_error_code(&errors, 3059), "{}", errors.log);

    let errors = compile_errors("void h() { int n = 2; float a[n]; }");
    assert!(has_error_code(&errors, 3058), "{}", errors.log);
}

#[test]
fn vector_types_never_grow_implicitly() {
    let errors = compile_errors(
        "void h() { float2 v = float2(1, 2); float4 w = v; }",
    );
    assert!(has_error_code(&errors, 3017), "{}", errors.log);
}

#[test]
fn shader_state_requires_a_function() {
    let errors = compile_errors(
        r#"
        uniform float x;
        technique t { pass { VertexShader = x; } }
        "#,
    );
    assert!(has_error_code(&errors, 3020), "{}", errors.log);
}

#[test]
fn unknown_pass_states_are_reported() {
    let errors = compile_errors(
        "technique t { pass { FrobnicateEnable = 1; } }",
    );
    assert!(has_error_code(&errors, 3004), "{}", errors.log);
}

#[test]
fn recovery_reports_multiple_errors() {
    let errors = compile_errors(
        r#"
        void a() { break; }
        void b() { continue; }
        "#,
    );
    assert!(has_error_code(&errors, 3518), "{}", errors.log);
    assert!(has_error_code(&errors, 3519), "{}", errors.log);
}

#[test]
fn function_parameters_reject_storage_qualifiers() {
    let errors = compile_errors("float f(uniform float x) { return x; }");
    assert!(has_error_code(&errors, 3047), "{}", errors.log);

    let errors = compile_errors("float f(out const float x) { return 0.0; }");
    assert!(has_error_code(&errors, 3046), "{}", errors.log);
}

#[test]
fn struct_members_cannot_nest_structs() {
    let errors = compile_errors(
        r#"
        struct A { float x; };
        struct B { A inner; };
        "#,
    );
    assert!(has_error_code(&errors, 3090), "{}", errors.log);
}

#[test]
fn methods_do_not_exist() {
    let errors = compile_errors(
        r#"
        struct A { float x; };
        void h() { A a; a.frob(); }
        "#,
    );
    assert!(has_error_code(&errors, 3088), "{}", errors.log);
}
