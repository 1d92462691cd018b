fn main() {
    // ESP-IDF environment propagation is only needed for the firmware binary.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
