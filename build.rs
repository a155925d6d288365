fn main() {
    // Ensure recompilation if migrations change
    println!("cargo:rerun-if-changed=src/db/migrations");
}
