use crate::models::Mesh;

/// Serialize a mesh as `v x y z` lines followed by `f i j k` lines.
/// Face indices are 1-based; lines are separated by `\n`.
pub fn mesh_to_obj(mesh: &Mesh) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(mesh.vertex_count() + mesh.triangle_count());

    for [x, y, z] in &mesh.positions {
        lines.push(format!("v {} {} {}", x, y, z));
    }

    for [a, b, c] in &mesh.triangles {
        lines.push(format!("f {} {} {}", a + 1, b + 1, c + 1));
    }

    lines.join("\n")
}
