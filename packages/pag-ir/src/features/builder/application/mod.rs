pub mod build_usecase;
