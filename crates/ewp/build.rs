use std::env;

fn main() {
    println!("cargo:rustc-check-cfg=cfg(ossl300)");

    // openssl-sys exports the linked library version to its direct dependents
    if let Ok(version) = env::var("DEP_OPENSSL_VERSION_NUMBER") {
        if u64::from_str_radix(&version, 16).map_or(false, |v| v >= 0x3000_0000) {
            println!("cargo:rustc-cfg=ossl300");
        }
    }
}
