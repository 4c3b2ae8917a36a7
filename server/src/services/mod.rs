pub mod nation_compiler;
