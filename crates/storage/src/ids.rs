/// Server-assigned opaque id.
pub fn generate() -> String {
    format!("{:032x}", rand::random::<u128>())
}
