/// Renders an embedding in the `[v1,v2,...]` form accepted by the
/// pgvector input parser. The literal is bound as a text parameter and
/// cast with `::vector` inside the SQL.
pub fn to_vector_literal(values: &[f32]) -> String {
    let joined = values
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<String>>()
        .join(",");

    format!("[{}]", joined)
}
