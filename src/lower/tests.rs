use super::*;
use crate::asm::AsmInstruction;
use crate::ir::{
    CondCode, Instruction, Literal, Local, LocalKind, MemoryScope, MemorySemantics, Method, OpCode,
    Semaphore, SemaphoreDirection, SetFlags, Value,
};
use crate::target::{BRANCH_DELAY_SLOTS, INSTRUCTION_BYTES};

/// A method computing a value in a loop head, with every local resolved.
fn resolved_method() -> (Method, Resolver) {
    let mut method = Method::new("kernel");
    let d = method.add_local("d", LocalKind::Value);
    let a = method.add_local("a", LocalKind::Value);
    let head = method.add_local("head", LocalKind::Label);

    method.push(Instruction::load_immediate(
        Value::Local(d.clone()),
        Literal::Int(1),
    ));
    method.push(Instruction::alu(
        OpCode::Add,
        Value::Local(d.clone()),
        Value::Local(d.clone()),
        Value::Local(a.clone()),
    ));
    method.push(Instruction::branch(head).with_condition(CondCode::ZeroClear));
    method.push(Instruction::semaphore(
        Semaphore::new(5).unwrap(),
        SemaphoreDirection::Increase,
        CondCode::Always,
        SetFlags::DontSet,
    ));

    let mut resolver = Resolver::new();
    resolver.map_register("d", Register::new(3).unwrap());
    resolver.map_register("a", Register::new(4).unwrap());
    resolver.map_label("head", 1);
    (method, resolver)
}

#[test]
fn test_lower_method_stream() {
    let (method, resolver) = resolved_method();
    let stream = lower_method(&method, &resolver).unwrap();
    assert_eq!(stream.len(), 4);

    match stream[0] {
        AsmInstruction::LoadImm(word) => {
            assert_eq!(word.immediate(), 1);
            assert_eq!(word.waddr_add(), 3);
        }
        other => panic!("expected load-immediate word, got {}", other),
    }
    match stream[1] {
        AsmInstruction::Alu(word) => {
            assert_eq!(word.op(), OpCode::Add.encoding() as u8);
            assert_eq!(word.raddr_a(), 3);
            assert_eq!(word.raddr_b(), 4);
        }
        other => panic!("expected alu word, got {}", other),
    }
    match stream[3] {
        AsmInstruction::Semaphore(word) => {
            assert_eq!(word.semaphore(), 5);
            assert_eq!(word.direction(), SemaphoreDirection::Increase);
        }
        other => panic!("expected semaphore word, got {}", other),
    }
}

#[test]
fn test_branch_offset_accounts_for_delay_slots() {
    let (method, resolver) = resolved_method();
    let stream = lower_method(&method, &resolver).unwrap();
    match stream[2] {
        AsmInstruction::Branch(word) => {
            // Branch sits at index 2, target at index 1.
            let expected = (1i64 - (2 + BRANCH_DELAY_SLOTS) as i64) * INSTRUCTION_BYTES as i64;
            assert_eq!(word.offset() as i64, expected);
            assert_eq!(word.cond_add(), CondCode::ZeroClear);
        }
        other => panic!("expected branch word, got {}", other),
    }
}

#[test]
fn test_semaphore_lowering_matches_contract() {
    let instruction = Instruction::semaphore(
        Semaphore::new(5).unwrap(),
        SemaphoreDirection::Increase,
        CondCode::Always,
        SetFlags::DontSet,
    );
    let word = match instruction.convert_to_asm(&Resolver::new(), 0).unwrap() {
        AsmInstruction::Semaphore(word) => word,
        other => panic!("expected semaphore word, got {}", other),
    };
    assert_eq!(word.semaphore(), 5);
    assert_eq!(word.direction(), SemaphoreDirection::Increase);
    assert_eq!(word.cond_add(), CondCode::Always);
    assert_eq!(word.cond_mul(), CondCode::Always);
    assert_eq!(word.set_flags(), SetFlags::DontSet);
    assert_eq!(word.waddr_add(), Register::NO_REG.number());
    assert_eq!(word.waddr_mul(), Register::NO_REG.number());
}

#[test]
fn test_barrier_always_fails_lowering() {
    let barrier = Instruction::mem_barrier(
        MemoryScope::Device,
        MemorySemantics::ACQUIRE | MemorySemantics::CROSS_WORK_GROUP_MEMORY,
    );
    let err = barrier.convert_to_asm(&Resolver::new(), 0).unwrap_err();
    assert!(err.is_internal());
    assert!(err.message.contains("memory barriers"));
    assert_eq!(err.construct, "mem-fence device, acquire|global");

    // A fully populated resolver changes nothing.
    let (_, resolver) = resolved_method();
    assert!(barrier.convert_to_asm(&resolver, 7).is_err());
}

#[test]
fn test_lifetime_always_fails_lowering() {
    let alloc = Value::Local(Local::new("buf", LocalKind::StackAllocation));
    let marker = Instruction::lifetime(alloc, false).unwrap();
    let err = marker.convert_to_asm(&Resolver::new(), 0).unwrap_err();
    assert!(err.is_internal());
    assert!(err.message.contains("lifetime"));
}

#[test]
fn test_metadata_in_stream_aborts_method() {
    let mut method = Method::new("kernel");
    method.push(Instruction::nop());
    method.push(Instruction::mem_barrier(
        MemoryScope::WorkGroup,
        MemorySemantics::ACQUIRE,
    ));
    let err = lower_method(&method, &Resolver::new()).unwrap_err();
    assert!(err.is_internal());
}

#[test]
fn test_unresolved_local_is_internal_error() {
    let mut method = Method::new("kernel");
    let d = method.add_local("d", LocalKind::Value);
    method.push(Instruction::mov(Value::Local(d), Value::None));
    let err = lower_method(&method, &Resolver::new()).unwrap_err();
    assert!(err.is_internal());
    assert_eq!(err.construct, "%d");
}

#[test]
fn test_unresolved_label_is_internal_error() {
    let mut method = Method::new("kernel");
    let elsewhere = method.add_local("elsewhere", LocalKind::Label);
    method.push(Instruction::branch(elsewhere));
    let err = lower_method(&method, &Resolver::new()).unwrap_err();
    assert!(err.is_internal());
    assert!(err.message.contains("label"));
}

#[test]
fn test_branch_target_must_be_label() {
    let resolver = Resolver::new();
    let err = resolver
        .index_for(&Local::new("x", LocalKind::Value))
        .unwrap_err();
    assert!(err.is_internal());
    assert!(err.message.contains("not a label"));
}

#[test]
fn test_code_size_skips_metadata() {
    let mut method = Method::new("kernel");
    let alloc = method.add_local("buf", LocalKind::StackAllocation);
    let head = method.add_local("head", LocalKind::Label);
    method.push(Instruction::label(head));
    method.push(Instruction::lifetime(Value::Local(alloc), false).unwrap());
    method.push(Instruction::nop());
    method.push(Instruction::nop());
    assert_eq!(code_size(&method.instructions), 2);
    assert_eq!(method.code_size(), 2);
}

#[test]
fn test_lower_module_matches_sequential() {
    let jobs: Vec<(Method, Resolver)> = (0..8).map(|_| resolved_method()).collect();
    let job_refs: Vec<(&Method, &Resolver)> =
        jobs.iter().map(|(m, r)| (m, r)).collect();

    let profiler = Profiler::new();
    let parallel = lower_module(&job_refs, &profiler).unwrap();

    for (stream, (method, resolver)) in parallel.iter().zip(&jobs) {
        let sequential = lower_method(method, resolver).unwrap();
        assert_eq!(stream, &sequential);
    }

    // Every worker flushed its scope into the shared registry.
    let timings = profiler.timings();
    assert_eq!(timings[0].0, "lower_method");
    assert_eq!(timings[0].1.invocations, 8);
    assert_eq!(profiler.counters()[0].1.count, 8 * 4);
}

#[test]
fn test_lower_module_propagates_defects() {
    let mut method = Method::new("broken");
    let alloc = method.add_local("buf", LocalKind::StackAllocation);
    method.push(Instruction::lifetime(Value::Local(alloc), true).unwrap());
    let resolver = Resolver::new();

    let profiler = Profiler::new();
    let err = lower_module(&[(&method, &resolver)], &profiler).unwrap_err();
    assert!(err.is_internal());
}
