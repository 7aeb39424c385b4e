pub mod sweep_loop;
