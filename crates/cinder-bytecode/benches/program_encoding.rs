use cinder_bytecode::{
    Argument, Header, IndexEntry, Instruction, Opcode, Program, Target, Value, LHS_REGISTER,
    RHS_REGISTER,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn build_program(blocks: usize) -> Program {
    let mut instructions = vec![Instruction::Func { params: 1 }];
    for block in 0..blocks {
        let base = instructions.len() as i64;
        instructions.push(Instruction::LoadX {
            name: format!("arr_{}", block),
            index: vec![IndexEntry::Int(0), IndexEntry::Name("i".to_string())],
            reg: LHS_REGISTER,
        });
        instructions.push(Instruction::LoadI {
            reg: RHS_REGISTER,
            value: block as i64,
        });
        instructions.push(Instruction::Binary {
            op: Opcode::Add,
            lhs: LHS_REGISTER,
            rhs: RHS_REGISTER,
        });
        instructions.push(Instruction::Call {
            target: Target::Offset(-1),
        });
        instructions.push(Instruction::Arg(Argument::ByValue(Value::from("x"))));
        instructions.push(Instruction::Jmp {
            target: Target::Offset(base + 6),
        });
    }
    instructions.push(Instruction::Ret);
    let len = instructions.len() as i64;
    Program::new(
        Header {
            entry_offset: 0,
            entry_end_offset: len - 1,
            global_section_len: 0,
        },
        instructions,
    )
}

fn bench_encode(c: &mut Criterion) {
    let program = build_program(1_000);
    c.bench_function("encode_program", |b| {
        b.iter(|| black_box(&program).encode().unwrap())
    });
}

fn bench_decode(c: &mut Criterion) {
    let bytes = build_program(1_000).encode().unwrap();
    c.bench_function("decode_program", |b| {
        b.iter(|| Program::decode(black_box(&bytes)).unwrap())
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
